//! Per-patient procedure history.
//!
//! A bounded stack of free-text procedure descriptions. The most recent entry is the one
//! consulted and undone first.

use crate::constants::{HISTORY_CAPACITY, PROCEDURE_MAX_CHARS};
use crate::{TriageError, TriageResult};

/// Bounded LIFO of procedure descriptions.
///
/// Entries are stored oldest first; the top of the stack is the last element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a procedure onto the top of the history.
    ///
    /// Leading and trailing whitespace is trimmed before validation. Over-long descriptions are
    /// rejected whole, never truncated.
    ///
    /// # Errors
    ///
    /// - [`TriageError::EmptyProcedure`] if the trimmed text is empty,
    /// - [`TriageError::ProcedureTooLong`] if it exceeds [`PROCEDURE_MAX_CHARS`],
    /// - [`TriageError::HistoryFull`] if [`HISTORY_CAPACITY`] entries are already stored,
    /// - [`TriageError::Allocation`] if the entry cannot be allocated.
    pub fn push(&mut self, text: &str) -> TriageResult<()> {
        let text = validate_procedure(text)?;
        if self.is_full() {
            return Err(TriageError::HistoryFull {
                capacity: HISTORY_CAPACITY,
            });
        }

        self.entries.try_reserve(1)?;
        self.entries.push(text.to_owned());
        Ok(())
    }

    /// Removes and returns the most recent procedure.
    pub fn pop(&mut self) -> Option<String> {
        self.entries.pop()
    }

    /// Returns the most recent procedure without removing it.
    pub fn peek(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    /// Linear scan for an exact (trimmed) match.
    pub fn contains(&self, text: &str) -> bool {
        let text = text.trim();
        self.entries.iter().any(|entry| entry == text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= HISTORY_CAPACITY
    }

    /// Iterates from the most recent procedure to the oldest.
    pub fn recent_first(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().rev().map(String::as_str)
    }

    /// Iterates from the oldest procedure to the most recent.
    pub fn oldest_first(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

/// Trims `text` and checks it against the procedure length bounds.
pub(crate) fn validate_procedure(text: &str) -> TriageResult<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TriageError::EmptyProcedure);
    }

    let len = trimmed.chars().count();
    if len > PROCEDURE_MAX_CHARS {
        return Err(TriageError::ProcedureTooLong {
            len,
            max: PROCEDURE_MAX_CHARS,
        });
    }

    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifo_order() {
        let mut history = History::new();
        history.push("X-ray").unwrap();
        history.push("Surgery").unwrap();

        assert_eq!(history.pop().as_deref(), Some("Surgery"));
        assert_eq!(history.pop().as_deref(), Some("X-ray"));
        assert_eq!(history.pop(), None);
    }

    #[test]
    fn test_peek_does_not_remove() {
        let mut history = History::new();
        assert_eq!(history.peek(), None);

        history.push("Blood test").unwrap();
        assert_eq!(history.peek(), Some("Blood test"));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_eleventh_entry_rejected() {
        let mut history = History::new();
        for i in 0..HISTORY_CAPACITY {
            history.push(&format!("procedure {i}")).unwrap();
        }
        assert!(history.is_full());

        let result = history.push("one too many");
        assert!(matches!(
            result,
            Err(TriageError::HistoryFull { capacity: 10 })
        ));
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.peek(), Some("procedure 9"));
    }

    #[test]
    fn test_over_long_entry_rejected_not_truncated() {
        let mut history = History::new();
        let long = "a".repeat(PROCEDURE_MAX_CHARS + 1);

        let result = history.push(&long);
        assert!(matches!(
            result,
            Err(TriageError::ProcedureTooLong { len: 101, max: 100 })
        ));
        assert!(history.is_empty());

        let exact = "b".repeat(PROCEDURE_MAX_CHARS);
        history.push(&exact).unwrap();
        assert_eq!(history.peek(), Some(exact.as_str()));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let mut history = History::new();
        // 100 two-byte characters
        let accented = "é".repeat(PROCEDURE_MAX_CHARS);
        assert!(history.push(&accented).is_ok());
    }

    #[test]
    fn test_blank_entry_rejected() {
        let mut history = History::new();
        assert!(matches!(
            history.push("   "),
            Err(TriageError::EmptyProcedure)
        ));
    }

    #[test]
    fn test_contains_and_traversal_order() {
        let mut history = History::new();
        history.push("Triage").unwrap();
        history.push(" ECG ").unwrap();
        history.push("Sutures").unwrap();

        assert!(history.contains("ECG"));
        assert!(!history.contains("MRI"));

        let recent: Vec<&str> = history.recent_first().collect();
        assert_eq!(recent, vec!["Sutures", "ECG", "Triage"]);

        let oldest: Vec<&str> = history.oldest_first().collect();
        assert_eq!(oldest, vec!["Triage", "ECG", "Sutures"]);
    }
}
