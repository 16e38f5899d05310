use std::collections::TryReserveError;
use std::path::PathBuf;
use triage_cpf::{Cpf, CpfError};

#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid CPF: {0}")]
    Cpf(#[from] CpfError),
    #[error("out of memory: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("patient {0} not found")]
    PatientNotFound(Cpf),
    #[error("patient {0} is already registered")]
    DuplicatePatient(Cpf),
    #[error("patient {0} is already in the waiting queue")]
    AlreadyQueued(Cpf),
    #[error("patient {0} is queued and cannot be removed")]
    PatientQueued(Cpf),
    #[error("waiting queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("procedure history is full (capacity {capacity})")]
    HistoryFull { capacity: usize },
    #[error("procedure history is empty")]
    EmptyHistory,
    #[error("procedure description cannot be empty")]
    EmptyProcedure,
    #[error("procedure description has {len} characters, the limit is {max}")]
    ProcedureTooLong { len: usize, max: usize },

    #[error("failed to create data directory: {0}")]
    DataDirCreation(std::io::Error),
    #[error("failed to read data file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write data file: {0}")]
    FileWrite(std::io::Error),
    #[error(
        "corrupt data file {path} at record {record}: {reason}",
        path = path.display()
    )]
    CorruptArtifact {
        path: PathBuf,
        record: usize,
        reason: String,
    },
}

pub type TriageResult<T> = std::result::Result<T, TriageError>;
