//! The waiting room.
//!
//! [`DispatchQueue`] keeps one FIFO bucket per urgency [`Level`]. Patients are called in strict
//! level order (every `Immediate` patient before any `VeryUrgent` one, and so on) and in arrival
//! order within a level.
//!
//! The queue never owns a patient. Buckets hold [`Cpf`] keys which are resolved against the
//! [`Registry`] when a patient is called, so dropping or clearing the queue can never free a
//! record the registry still needs.

use crate::patient::Patient;
use crate::registry::Registry;
use crate::ticket::{Level, Ticket, TicketCounter, LEVEL_COUNT};
use crate::{TriageError, TriageResult};
use std::collections::VecDeque;
use triage_cpf::Cpf;

/// Priority-bucketed FIFO of patient keys.
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    buckets: [VecDeque<Cpf>; LEVEL_COUNT],
    capacity: usize,
    counter: TicketCounter,
    len: usize,
}

impl DispatchQueue {
    /// Creates an empty queue holding at most `capacity` patients across all levels.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Aggregate limit over the five buckets.
    /// * `counter` - Source of ticket sequence numbers for this queue.
    pub fn new(capacity: usize, counter: TicketCounter) -> Self {
        Self {
            buckets: Default::default(),
            capacity,
            counter,
            len: 0,
        }
    }

    /// Adds `patient` to the back of the `level` bucket and issues a fresh ticket.
    ///
    /// The ticket is stored on the patient and returned.
    ///
    /// # Errors
    ///
    /// - [`TriageError::AlreadyQueued`] if the patient is already waiting,
    /// - [`TriageError::QueueFull`] if the queue is at capacity,
    /// - [`TriageError::Allocation`] if the bucket cannot grow.
    ///
    /// On error neither the queue nor the patient is modified.
    pub fn enter(&mut self, patient: &mut Patient, level: Level) -> TriageResult<Ticket> {
        self.check_admission(patient, level)?;
        let ticket = self.counter.issue(level);
        self.admit(patient, ticket);
        Ok(ticket)
    }

    /// Re-enqueues `patient` with a previously issued ticket.
    ///
    /// Used when rebuilding the queue from disk. The ticket counter is advanced past the
    /// restored sequence so new tickets never repeat it.
    ///
    /// # Errors
    ///
    /// Same as [`DispatchQueue::enter`].
    pub fn restore(&mut self, patient: &mut Patient, ticket: Ticket) -> TriageResult<()> {
        self.check_admission(patient, ticket.level())?;
        self.counter.observe(ticket.sequence());
        self.admit(patient, ticket);
        Ok(())
    }

    /// Calls the next patient: the head of the most urgent non-empty bucket.
    ///
    /// The patient's `queued` flag is cleared. Keys that no longer resolve in `registry` are
    /// discarded with a warning and the scan continues. Returns `None` once every bucket is
    /// empty.
    pub fn dispatch<'r>(&mut self, registry: &'r mut Registry) -> Option<&'r Patient> {
        loop {
            let (level, id) = self.pop_front()?;
            if !registry.contains(&id) {
                tracing::warn!(cpf = %id, "queued patient is no longer registered, skipping");
                continue;
            }

            let patient = registry.get_mut(&id)?;
            patient.mark_dequeued();
            tracing::debug!(cpf = %id, level = level.index(), "patient called");
            return Some(&*patient);
        }
    }

    /// Removes `id` from whichever bucket holds it without calling the patient.
    ///
    /// Returns `false` if the patient was not waiting.
    pub fn withdraw(&mut self, id: &Cpf, registry: &mut Registry) -> bool {
        for bucket in self.buckets.iter_mut() {
            if let Some(pos) = bucket.iter().position(|queued| queued == id) {
                bucket.remove(pos);
                self.len -= 1;
                if let Some(patient) = registry.get_mut(id) {
                    patient.mark_dequeued();
                }
                return true;
            }
        }
        false
    }

    /// Linear search across every bucket.
    pub fn contains(&self, id: &Cpf) -> bool {
        self.level_of(id).is_some()
    }

    /// Level of the bucket holding `id`, if any.
    pub fn level_of(&self, id: &Cpf) -> Option<Level> {
        Level::ALL
            .into_iter()
            .find(|level| self.buckets[level.index()].contains(id))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of patients waiting at `level`.
    pub fn len_at(&self, level: Level) -> usize {
        self.buckets[level.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sequence number the next issued ticket will carry.
    pub fn next_sequence(&self) -> u32 {
        self.counter.peek_next()
    }

    /// Waiting patients in the order they would be called.
    pub fn iter(&self) -> impl Iterator<Item = (Level, &Cpf)> {
        Level::ALL
            .into_iter()
            .flat_map(move |level| self.buckets[level.index()].iter().map(move |id| (level, id)))
    }

    /// Pops the next key in dispatch order without touching the registry.
    pub(crate) fn pop_front(&mut self) -> Option<(Level, Cpf)> {
        for level in Level::ALL {
            if let Some(id) = self.buckets[level.index()].pop_front() {
                self.len -= 1;
                return Some((level, id));
            }
        }
        None
    }

    /// Empties every bucket. Patients are left as they are; the caller is discarding them too.
    pub(crate) fn clear(&mut self) {
        for bucket in self.buckets.iter_mut() {
            bucket.clear();
        }
        self.len = 0;
    }

    /// Keeps future tickets after one issued before a restart.
    pub(crate) fn observe(&mut self, ticket: Ticket) {
        self.counter.observe(ticket.sequence());
    }

    fn check_admission(&mut self, patient: &Patient, level: Level) -> TriageResult<()> {
        if patient.is_queued() || self.contains(patient.id()) {
            return Err(TriageError::AlreadyQueued(patient.id().clone()));
        }
        if self.is_full() {
            return Err(TriageError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.buckets[level.index()].try_reserve(1)?;
        Ok(())
    }

    fn admit(&mut self, patient: &mut Patient, ticket: Ticket) {
        self.buckets[ticket.level().index()].push_back(patient.id().clone());
        self.len += 1;
        patient.mark_queued(ticket);
    }
}
