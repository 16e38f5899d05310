//! Triage service.
//!
//! [`TriageService`] is the front desk: it owns the registry and the waiting queue, enforces the
//! rules that span both (a queued patient cannot be removed, a patient can only wait once) and
//! persists them through [`crate::persistence`].

use crate::config::CoreConfig;
use crate::dispatch::DispatchQueue;
use crate::history::History;
use crate::patient::Patient;
use crate::persistence::{self, LoadReport, SaveReport};
use crate::registry::Registry;
use crate::ticket::{Level, Ticket, TicketCounter};
use crate::{TriageError, TriageResult};
use std::sync::Arc;
use triage_cpf::Cpf;

/// Patient registry and waiting room for one emergency department.
#[derive(Debug)]
pub struct TriageService {
    cfg: Arc<CoreConfig>,
    registry: Registry,
    queue: DispatchQueue,
}

impl TriageService {
    /// Creates a service with no patients.
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        let queue = DispatchQueue::new(cfg.queue_capacity(), TicketCounter::default());
        Self {
            cfg,
            registry: Registry::new(),
            queue,
        }
    }

    /// Creates a service and loads any state saved under the configured data directory.
    ///
    /// # Returns
    ///
    /// The service together with a [`LoadReport`] listing any records that could not be
    /// restored.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::FileRead`] if a data file exists but cannot be read.
    pub fn open(cfg: Arc<CoreConfig>) -> TriageResult<(Self, LoadReport)> {
        let mut service = Self::new(cfg);
        let report = persistence::load(&mut service.registry, &mut service.queue, &service.cfg)?;
        Ok((service, report))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Registers a new patient.
    ///
    /// # Errors
    ///
    /// - [`TriageError::InvalidInput`] if the name is blank,
    /// - [`TriageError::DuplicatePatient`] if the CPF is already registered.
    pub fn register(&mut self, id: Cpf, name: &str) -> TriageResult<&Patient> {
        let patient = Patient::new(id.clone(), name)?;
        self.registry.insert(patient)?;
        tracing::debug!(cpf = %id, "patient registered");
        self.patient(&id)
    }

    /// Removes a patient from the registry (discharge or death).
    ///
    /// # Errors
    ///
    /// - [`TriageError::PatientNotFound`] if the CPF is not registered,
    /// - [`TriageError::PatientQueued`] while the patient is waiting to be called.
    pub fn remove(&mut self, id: &Cpf) -> TriageResult<Patient> {
        let patient = self.patient(id)?;
        if patient.is_queued() || self.queue.contains(id) {
            return Err(TriageError::PatientQueued(id.clone()));
        }

        let removed = self
            .registry
            .remove(id)
            .ok_or_else(|| TriageError::PatientNotFound(id.clone()))?;
        tracing::debug!(cpf = %id, "patient removed");
        Ok(removed)
    }

    /// Looks a patient up by CPF.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::PatientNotFound`] if the CPF is not registered.
    pub fn patient(&self, id: &Cpf) -> TriageResult<&Patient> {
        self.registry
            .get(id)
            .ok_or_else(|| TriageError::PatientNotFound(id.clone()))
    }

    /// Every registered patient in ascending CPF order.
    pub fn patients(&self) -> impl Iterator<Item = &Patient> {
        self.registry.iter()
    }

    pub fn patient_count(&self) -> usize {
        self.registry.len()
    }

    /// Places a registered patient in the waiting queue at `level`.
    ///
    /// # Errors
    ///
    /// - [`TriageError::PatientNotFound`] if the CPF is not registered,
    /// - [`TriageError::AlreadyQueued`] if the patient is already waiting,
    /// - [`TriageError::QueueFull`] if the queue is at capacity.
    pub fn triage(&mut self, id: &Cpf, level: Level) -> TriageResult<Ticket> {
        let patient = self
            .registry
            .get_mut(id)
            .ok_or_else(|| TriageError::PatientNotFound(id.clone()))?;
        let ticket = self.queue.enter(patient, level)?;
        tracing::debug!(cpf = %id, ticket = %ticket, "patient triaged");
        Ok(ticket)
    }

    /// Calls the next patient, most urgent first. Returns `None` if nobody is waiting.
    pub fn call_next(&mut self) -> Option<&Patient> {
        self.queue.dispatch(&mut self.registry)
    }

    /// Takes a patient out of the waiting queue without calling them.
    ///
    /// # Errors
    ///
    /// - [`TriageError::PatientNotFound`] if the CPF is not registered,
    /// - [`TriageError::InvalidInput`] if the patient is not waiting.
    pub fn leave_queue(&mut self, id: &Cpf) -> TriageResult<()> {
        self.patient(id)?;
        if self.queue.withdraw(id, &mut self.registry) {
            tracing::debug!(cpf = %id, "patient left the queue");
            Ok(())
        } else {
            Err(TriageError::InvalidInput(format!(
                "patient {id} is not in the waiting queue"
            )))
        }
    }

    /// Waiting patients in the order they will be called.
    pub fn waiting(&self) -> Vec<(Level, &Patient)> {
        self.queue
            .iter()
            .filter_map(|(level, id)| self.registry.get(id).map(|patient| (level, patient)))
            .collect()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Records a procedure on the patient's history.
    ///
    /// # Errors
    ///
    /// - [`TriageError::PatientNotFound`] if the CPF is not registered,
    /// - [`TriageError::EmptyProcedure`], [`TriageError::ProcedureTooLong`] or
    ///   [`TriageError::HistoryFull`] from [`History::push`].
    pub fn add_procedure(&mut self, id: &Cpf, text: &str) -> TriageResult<()> {
        self.patient_mut(id)?.history_mut().push(text)
    }

    /// Undoes the most recent procedure and returns it.
    ///
    /// # Errors
    ///
    /// - [`TriageError::PatientNotFound`] if the CPF is not registered,
    /// - [`TriageError::EmptyHistory`] if there is nothing to undo.
    pub fn undo_procedure(&mut self, id: &Cpf) -> TriageResult<String> {
        self.patient_mut(id)?
            .history_mut()
            .pop()
            .ok_or(TriageError::EmptyHistory)
    }

    /// The most recent procedure, if any.
    pub fn last_procedure(&self, id: &Cpf) -> TriageResult<Option<&str>> {
        Ok(self.patient(id)?.history().peek())
    }

    pub fn history(&self, id: &Cpf) -> TriageResult<&History> {
        Ok(self.patient(id)?.history())
    }

    /// Writes all state to disk, leaving the service empty.
    ///
    /// On error the in-memory state is left as it was.
    pub fn save(&mut self) -> TriageResult<SaveReport> {
        persistence::save(&mut self.registry, &mut self.queue, &self.cfg)
    }

    /// Saves and consumes the service.
    pub fn shutdown(mut self) -> TriageResult<SaveReport> {
        self.save()
    }

    fn patient_mut(&mut self, id: &Cpf) -> TriageResult<&mut Patient> {
        self.registry
            .get_mut(id)
            .ok_or_else(|| TriageError::PatientNotFound(id.clone()))
    }
}
