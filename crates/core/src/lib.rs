//! # Triage Core
//!
//! Core logic for the emergency-room triage system.
//!
//! This crate holds the data structures and the rules that tie them together:
//! - [`Registry`]: every registered patient, keyed by CPF, in a self-balancing tree
//! - [`DispatchQueue`]: patients waiting to be called, one FIFO per urgency [`Level`]
//! - [`History`]: bounded stack of procedures per patient, with undo
//! - [`persistence`]: binary save/load of the registry and the queue
//! - [`TriageService`]: the façade front ends talk to
//!
//! **No presentation concerns**: menus, argument parsing and output formatting belong in the
//! binaries.

pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod patient;
pub mod persistence;
pub mod registry;
pub mod service;
pub mod ticket;

pub use config::{resolve_data_dir, CoreConfig};
pub use dispatch::DispatchQueue;
pub use error::{TriageError, TriageResult};
pub use history::History;
pub use patient::Patient;
pub use persistence::{LoadReport, SaveReport};
pub use registry::Registry;
pub use service::TriageService;
pub use ticket::{Level, Ticket, TicketCounter};
pub use triage_cpf::Cpf;
