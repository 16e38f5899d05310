//! Patient registry.
//!
//! The registry is the sole owner of every [`Patient`]. It is an AVL tree keyed by [`Cpf`]:
//! for every node the heights of its two subtrees differ by at most one, which keeps insert,
//! lookup and removal at O(log n).
//!
//! # Storage
//!
//! Nodes live in an arena (`Vec` of slots plus a free list) and refer to their children by slot
//! index. Growing the arena goes through `try_reserve`, so running out of memory surfaces as
//! [`TriageError::Allocation`] at the operation boundary instead of aborting the process.
//!
//! # Removal
//!
//! A node with two children is replaced by its in-order predecessor (the rightmost node of its
//! left subtree). Every node on the path back to the root is rebalanced.

use crate::patient::Patient;
use crate::{TriageError, TriageResult};
use std::cmp::Ordering;
use triage_cpf::Cpf;

type NodeId = usize;
type Link = Option<NodeId>;

#[derive(Debug, Clone)]
struct Node {
    patient: Patient,
    left: Link,
    right: Link,
    height: u32,
}

impl Node {
    fn leaf(patient: Patient) -> Self {
        Self {
            patient,
            left: None,
            right: None,
            height: 1,
        }
    }
}

/// Balanced keyed store of patients.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    slots: Vec<Option<Node>>,
    free: Vec<NodeId>,
    root: Link,
    len: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the tree; 0 when empty.
    pub fn height(&self) -> u32 {
        self.height_of(self.root)
    }

    /// Inserts a patient keyed by its CPF.
    ///
    /// # Errors
    ///
    /// - [`TriageError::DuplicatePatient`] if the CPF is already registered; the existing record
    ///   is left untouched.
    /// - [`TriageError::Allocation`] if the arena cannot grow.
    pub fn insert(&mut self, patient: Patient) -> TriageResult<()> {
        if self.contains(patient.id()) {
            return Err(TriageError::DuplicatePatient(patient.id().clone()));
        }

        let new = self.alloc(patient)?;
        let root = self.root;
        self.root = Some(self.insert_at(root, new));
        self.len += 1;
        Ok(())
    }

    pub fn contains(&self, id: &Cpf) -> bool {
        self.find(id).is_some()
    }

    pub fn get(&self, id: &Cpf) -> Option<&Patient> {
        self.find(id).map(|at| &self.node(at).patient)
    }

    pub fn get_mut(&mut self, id: &Cpf) -> Option<&mut Patient> {
        let at = self.find(id)?;
        Some(&mut self.node_mut(at).patient)
    }

    /// Removes the patient with `id`, handing ownership to the caller.
    ///
    /// Returns `None` if no such patient is registered. The caller is responsible for checking
    /// that the patient is not waiting in the dispatch queue.
    pub fn remove(&mut self, id: &Cpf) -> Option<Patient> {
        let root = self.root;
        let (root, removed) = self.remove_at(root, id);
        self.root = root;
        removed.map(|at| self.release(at))
    }

    /// Removes and returns the patient with the smallest CPF.
    pub fn pop_first(&mut self) -> Option<Patient> {
        let root = self.root?;
        let (rest, min) = self.detach_min(root);
        self.root = rest;
        Some(self.release(min))
    }

    /// Removes and returns the patient with the largest CPF.
    pub fn pop_last(&mut self) -> Option<Patient> {
        let root = self.root?;
        let (rest, max) = self.detach_max(root);
        self.root = rest;
        Some(self.release(max))
    }

    /// In-order iterator: patients in ascending CPF order.
    pub fn iter(&self) -> Iter<'_> {
        let mut iter = Iter {
            registry: self,
            stack: Vec::new(),
            remaining: self.len,
        };
        iter.push_left_spine(self.root);
        iter
    }

    /// Visits every patient in ascending CPF order.
    pub fn for_each_in_order<F>(&self, visit: F)
    where
        F: FnMut(&Patient),
    {
        self.iter().for_each(visit);
    }

    /// Drops every patient.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.root = None;
        self.len = 0;
    }

    fn find(&self, id: &Cpf) -> Option<NodeId> {
        let mut link = self.root;
        while let Some(at) = link {
            let node = self.node(at);
            link = match id.cmp(node.patient.id()) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(at),
            };
        }
        None
    }

    fn alloc(&mut self, patient: Patient) -> TriageResult<NodeId> {
        if let Some(at) = self.free.pop() {
            self.slots[at] = Some(Node::leaf(patient));
            return Ok(at);
        }

        self.slots.try_reserve(1)?;
        // the free list can hold every slot, so release() never reallocates
        self.free.try_reserve(self.slots.len() + 1)?;
        self.slots.push(Some(Node::leaf(patient)));
        Ok(self.slots.len() - 1)
    }

    fn release(&mut self, at: NodeId) -> Patient {
        let node = self.slots[at].take().expect("linked slot is occupied");
        self.free.push(at);
        self.len -= 1;
        node.patient
    }

    fn node(&self, at: NodeId) -> &Node {
        self.slots[at].as_ref().expect("linked slot is occupied")
    }

    fn node_mut(&mut self, at: NodeId) -> &mut Node {
        self.slots[at].as_mut().expect("linked slot is occupied")
    }

    fn key(&self, at: NodeId) -> &Cpf {
        self.node(at).patient.id()
    }

    fn height_of(&self, link: Link) -> u32 {
        link.map_or(0, |at| self.node(at).height)
    }

    fn balance_factor(&self, at: NodeId) -> i64 {
        let node = self.node(at);
        i64::from(self.height_of(node.left)) - i64::from(self.height_of(node.right))
    }

    fn update_height(&mut self, at: NodeId) {
        let (left, right) = {
            let node = self.node(at);
            (node.left, node.right)
        };
        let height = 1 + taller(self.height_of(left), self.height_of(right));
        self.node_mut(at).height = height;
    }

    fn insert_at(&mut self, link: Link, new: NodeId) -> NodeId {
        let Some(at) = link else {
            return new;
        };

        if self.key(new) < self.key(at) {
            let left = self.node(at).left;
            let left = self.insert_at(left, new);
            self.node_mut(at).left = Some(left);
        } else {
            let right = self.node(at).right;
            let right = self.insert_at(right, new);
            self.node_mut(at).right = Some(right);
        }

        self.rebalance(at)
    }

    /// Returns the new subtree root and the detached node, if `id` was found.
    fn remove_at(&mut self, link: Link, id: &Cpf) -> (Link, Option<NodeId>) {
        let Some(at) = link else {
            return (None, None);
        };

        match id.cmp(self.key(at)) {
            Ordering::Less => {
                let left = self.node(at).left;
                let (left, removed) = self.remove_at(left, id);
                self.node_mut(at).left = left;
                if removed.is_none() {
                    return (Some(at), None);
                }
                (Some(self.rebalance(at)), removed)
            }
            Ordering::Greater => {
                let right = self.node(at).right;
                let (right, removed) = self.remove_at(right, id);
                self.node_mut(at).right = right;
                if removed.is_none() {
                    return (Some(at), None);
                }
                (Some(self.rebalance(at)), removed)
            }
            Ordering::Equal => {
                let (left, right) = {
                    let node = self.node(at);
                    (node.left, node.right)
                };
                let replacement = match (left, right) {
                    (None, None) => None,
                    (Some(child), None) | (None, Some(child)) => Some(child),
                    (Some(left), Some(right)) => {
                        let (rest, predecessor) = self.detach_max(left);
                        let node = self.node_mut(predecessor);
                        node.left = rest;
                        node.right = Some(right);
                        Some(self.rebalance(predecessor))
                    }
                };
                (replacement, Some(at))
            }
        }
    }

    /// Unlinks the rightmost node under `at`. Returns the new subtree root and that node.
    fn detach_max(&mut self, at: NodeId) -> (Link, NodeId) {
        match self.node(at).right {
            None => (self.node(at).left, at),
            Some(right) => {
                let (rest, max) = self.detach_max(right);
                self.node_mut(at).right = rest;
                (Some(self.rebalance(at)), max)
            }
        }
    }

    /// Unlinks the leftmost node under `at`. Returns the new subtree root and that node.
    fn detach_min(&mut self, at: NodeId) -> (Link, NodeId) {
        match self.node(at).left {
            None => (self.node(at).right, at),
            Some(left) => {
                let (rest, min) = self.detach_min(left);
                self.node_mut(at).left = rest;
                (Some(self.rebalance(at)), min)
            }
        }
    }

    fn rebalance(&mut self, at: NodeId) -> NodeId {
        self.update_height(at);
        let balance = self.balance_factor(at);

        if balance > 1 {
            let left = self.node(at).left.expect("left-heavy node has a left child");
            if self.balance_factor(left) < 0 {
                let left = self.rotate_left(left);
                self.node_mut(at).left = Some(left);
            }
            return self.rotate_right(at);
        }

        if balance < -1 {
            let right = self
                .node(at)
                .right
                .expect("right-heavy node has a right child");
            if self.balance_factor(right) > 0 {
                let right = self.rotate_right(right);
                self.node_mut(at).right = Some(right);
            }
            return self.rotate_left(at);
        }

        at
    }

    //     y          x
    //    / \        / \
    //   x   c  ->  a   y
    //  / \            / \
    // a   b          b   c
    fn rotate_right(&mut self, y: NodeId) -> NodeId {
        let x = self.node(y).left.expect("rotate_right needs a left child");
        let b = self.node(x).right;
        self.node_mut(y).left = b;
        self.node_mut(x).right = Some(y);
        self.update_height(y);
        self.update_height(x);
        x
    }

    fn rotate_left(&mut self, x: NodeId) -> NodeId {
        let y = self.node(x).right.expect("rotate_left needs a right child");
        let b = self.node(y).left;
        self.node_mut(x).right = b;
        self.node_mut(y).left = Some(x);
        self.update_height(x);
        self.update_height(y);
        y
    }
}

/// Larger of two subtree heights.
fn taller(a: u32, b: u32) -> u32 {
    if a >= b {
        a
    } else {
        b
    }
}

/// In-order iterator over a [`Registry`].
pub struct Iter<'a> {
    registry: &'a Registry,
    stack: Vec<NodeId>,
    remaining: usize,
}

impl<'a> Iter<'a> {
    fn push_left_spine(&mut self, mut link: Link) {
        while let Some(at) = link {
            self.stack.push(at);
            link = self.registry.node(at).left;
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Patient;

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.stack.pop()?;
        let node = self.registry.node(at);
        self.push_left_spine(node.right);
        self.remaining -= 1;
        Some(&node.patient)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a Patient;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn cpf(n: u32) -> Cpf {
        Cpf::from_base(&format!("{:09}", n)).unwrap()
    }

    fn patient(n: u32) -> Patient {
        Patient::new(cpf(n), &format!("Patient {n}")).unwrap()
    }

    fn root_key(registry: &Registry) -> Option<Cpf> {
        registry.root.map(|at| registry.key(at).clone())
    }

    /// Recomputes heights and checks balance and ordering; returns the subtree height.
    fn check_subtree(
        registry: &Registry,
        link: Link,
        lower: Option<&Cpf>,
        upper: Option<&Cpf>,
    ) -> u32 {
        let Some(at) = link else {
            return 0;
        };
        let node = registry.node(at);
        let key = node.patient.id();
        if let Some(lower) = lower {
            assert!(key > lower, "BST order violated at {key}");
        }
        if let Some(upper) = upper {
            assert!(key < upper, "BST order violated at {key}");
        }

        let left = check_subtree(registry, node.left, lower, Some(key));
        let right = check_subtree(registry, node.right, Some(key), upper);
        assert!(
            left.abs_diff(right) <= 1,
            "unbalanced at {key}: left {left}, right {right}"
        );
        let height = 1 + left.max(right);
        assert_eq!(node.height, height, "stale height at {key}");
        height
    }

    fn assert_avl(registry: &Registry) {
        check_subtree(registry, registry.root, None, None);
        assert_eq!(registry.iter().count(), registry.len());
    }

    #[test]
    fn test_insert_and_get() {
        let mut registry = Registry::new();
        registry.insert(patient(5)).unwrap();
        registry.insert(patient(3)).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(&cpf(3)).unwrap().name(), "Patient 3");
        assert!(registry.get(&cpf(4)).is_none());
        assert!(registry.contains(&cpf(5)));
    }

    #[test]
    fn test_duplicate_rejected_and_original_kept() {
        let mut registry = Registry::new();
        registry.insert(patient(1)).unwrap();

        let imposter = Patient::new(cpf(1), "Someone else").unwrap();
        let result = registry.insert(imposter);
        assert!(matches!(result, Err(TriageError::DuplicatePatient(_))));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&cpf(1)).unwrap().name(), "Patient 1");
    }

    #[test]
    fn test_ascending_inserts_stay_balanced() {
        let mut registry = Registry::new();
        for n in 1..=7 {
            registry.insert(patient(n)).unwrap();
            assert_avl(&registry);
        }
        assert_eq!(registry.height(), 3);
        assert_eq!(root_key(&registry), Some(cpf(4)));
    }

    #[test]
    fn test_left_right_rotation() {
        let mut registry = Registry::new();
        for n in [30, 10, 20] {
            registry.insert(patient(n)).unwrap();
        }
        assert_eq!(root_key(&registry), Some(cpf(20)));
        assert_eq!(registry.height(), 2);
        assert_avl(&registry);
    }

    #[test]
    fn test_right_left_rotation() {
        let mut registry = Registry::new();
        for n in [10, 30, 20] {
            registry.insert(patient(n)).unwrap();
        }
        assert_eq!(root_key(&registry), Some(cpf(20)));
        assert_avl(&registry);
    }

    #[test]
    fn test_remove_two_children_uses_predecessor() {
        let mut registry = Registry::new();
        for n in [20, 10, 30] {
            registry.insert(patient(n)).unwrap();
        }

        let removed = registry.remove(&cpf(20)).unwrap();
        assert_eq!(removed.id(), &cpf(20));
        assert_eq!(root_key(&registry), Some(cpf(10)));
        assert_avl(&registry);
    }

    #[test]
    fn test_remove_missing_returns_none() {
        let mut registry = Registry::new();
        registry.insert(patient(1)).unwrap();
        assert!(registry.remove(&cpf(2)).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_rebalances() {
        let mut registry = Registry::new();
        for n in 1..=15 {
            registry.insert(patient(n)).unwrap();
        }
        for n in [1, 2, 3, 5, 8, 13] {
            assert!(registry.remove(&cpf(n)).is_some());
            assert_avl(&registry);
        }
        assert_eq!(registry.len(), 9);
    }

    #[test]
    fn test_pop_first_and_last() {
        let mut registry = Registry::new();
        for n in [4, 2, 6, 1, 3, 5, 7] {
            registry.insert(patient(n)).unwrap();
        }

        assert_eq!(registry.pop_first().unwrap().id(), &cpf(1));
        assert_eq!(registry.pop_last().unwrap().id(), &cpf(7));
        assert_avl(&registry);

        let mut drained = Vec::new();
        while let Some(p) = registry.pop_first() {
            drained.push(p.id().clone());
            assert_avl(&registry);
        }
        assert_eq!(drained, (2..=6).map(cpf).collect::<Vec<_>>());
        assert!(registry.is_empty());
        assert!(registry.pop_last().is_none());
    }

    #[test]
    fn test_slots_are_reused() {
        let mut registry = Registry::new();
        for n in 0..4 {
            registry.insert(patient(n)).unwrap();
        }
        registry.remove(&cpf(2)).unwrap();
        registry.insert(patient(9)).unwrap();
        assert_eq!(registry.slots.len(), 4);
        assert_avl(&registry);
    }

    #[test]
    fn test_in_order_traversal() {
        let mut registry = Registry::new();
        for n in [50, 20, 80, 10, 30] {
            registry.insert(patient(n)).unwrap();
        }

        let mut visited = Vec::new();
        registry.for_each_in_order(|p| visited.push(p.id().clone()));
        assert_eq!(visited, [10, 20, 30, 50, 80].map(cpf).to_vec());
        assert_eq!(registry.iter().len(), 5);
    }

    #[test]
    fn test_get_mut_updates_history() {
        let mut registry = Registry::new();
        registry.insert(patient(1)).unwrap();
        registry
            .get_mut(&cpf(1))
            .unwrap()
            .history_mut()
            .push("Suture")
            .unwrap();
        assert_eq!(registry.get(&cpf(1)).unwrap().history().peek(), Some("Suture"));
    }

    #[test]
    fn test_clear() {
        let mut registry = Registry::new();
        for n in 0..10 {
            registry.insert(patient(n)).unwrap();
        }
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.height(), 0);
        assert_eq!(registry.iter().next(), None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(u32),
        Remove(u32),
        PopFirst,
        PopLast,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0u32..300).prop_map(Op::Insert),
            3 => (0u32..300).prop_map(Op::Remove),
            1 => Just(Op::PopFirst),
            1 => Just(Op::PopLast),
        ]
    }

    proptest! {
        /// Any sequence of operations keeps the AVL shape and matches an ordered-set model.
        #[test]
        fn prop_matches_ordered_set(ops in prop::collection::vec(arb_op(), 1..200)) {
            let mut registry = Registry::new();
            let mut model = BTreeSet::new();

            for op in ops {
                match op {
                    Op::Insert(n) => {
                        let inserted = registry.insert(patient(n)).is_ok();
                        prop_assert_eq!(inserted, model.insert(cpf(n)));
                    }
                    Op::Remove(n) => {
                        let removed = registry.remove(&cpf(n)).map(|p| p.id().clone());
                        prop_assert_eq!(removed.is_some(), model.remove(&cpf(n)));
                    }
                    Op::PopFirst => {
                        let popped = registry.pop_first().map(|p| p.id().clone());
                        prop_assert_eq!(popped, model.pop_first());
                    }
                    Op::PopLast => {
                        let popped = registry.pop_last().map(|p| p.id().clone());
                        prop_assert_eq!(popped, model.pop_last());
                    }
                }
                assert_avl(&registry);
            }

            let ids: Vec<Cpf> = registry.iter().map(|p| p.id().clone()).collect();
            let expected: Vec<Cpf> = model.into_iter().collect();
            prop_assert_eq!(ids, expected);
        }
    }
}
