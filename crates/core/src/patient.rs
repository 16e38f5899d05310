//! Patient records.
//!
//! A [`Patient`] is owned by the registry for its whole life. The waiting queue only ever refers
//! to a patient by [`Cpf`], so the `queued` flag and the ticket stored here are the patient's side
//! of that relationship.

use crate::history::History;
use crate::ticket::Ticket;
use crate::{TriageError, TriageResult};
use triage_cpf::Cpf;

/// A registered patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patient {
    id: Cpf,
    name: String,
    history: History,
    ticket: Option<Ticket>,
    queued: bool,
}

impl Patient {
    /// Creates a patient with an empty history and no ticket.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::InvalidInput`] if the trimmed name is empty.
    pub fn new(id: Cpf, name: &str) -> TriageResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TriageError::InvalidInput(
                "patient name cannot be empty".into(),
            ));
        }

        Ok(Self {
            id,
            name: name.to_owned(),
            history: History::new(),
            ticket: None,
            queued: false,
        })
    }

    pub fn id(&self) -> &Cpf {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// Ticket from the most recent triage, kept after the patient is called.
    pub fn ticket(&self) -> Option<Ticket> {
        self.ticket
    }

    /// True while the patient is waiting in the dispatch queue.
    pub fn is_queued(&self) -> bool {
        self.queued
    }

    pub(crate) fn mark_queued(&mut self, ticket: Ticket) {
        self.ticket = Some(ticket);
        self.queued = true;
    }

    pub(crate) fn mark_dequeued(&mut self) {
        self.queued = false;
    }

    /// Restores the ticket of a patient who has already been called.
    pub(crate) fn restore_ticket(&mut self, ticket: Ticket) {
        self.ticket = Some(ticket);
        self.queued = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::Level;

    fn cpf(s: &str) -> Cpf {
        Cpf::parse(s).unwrap()
    }

    #[test]
    fn test_new_trims_name() {
        let patient = Patient::new(cpf("111.111.111-11"), "  Alice  ").unwrap();
        assert_eq!(patient.name(), "Alice");
        assert!(patient.history().is_empty());
        assert!(!patient.is_queued());
        assert_eq!(patient.ticket(), None);
    }

    #[test]
    fn test_blank_name_rejected() {
        let result = Patient::new(cpf("111.111.111-11"), " \t");
        assert!(matches!(result, Err(TriageError::InvalidInput(_))));
    }

    #[test]
    fn test_ticket_survives_dequeue() {
        let mut patient = Patient::new(cpf("222.222.222-22"), "Bob").unwrap();
        let ticket = Ticket::new(Level::Urgent, 3);

        patient.mark_queued(ticket);
        assert!(patient.is_queued());

        patient.mark_dequeued();
        assert!(!patient.is_queued());
        assert_eq!(patient.ticket(), Some(ticket));
    }
}
