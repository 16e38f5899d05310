//! Constants used throughout the triage core crate.
//!
//! File names, capacities and on-disk framing values live here so the codec, the
//! configuration and the data structures agree on them.

/// Default directory for persisted state when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Environment variable consulted by front ends for the data directory.
pub const DATA_DIR_ENV_VAR: &str = "TRIAGE_DATA_DIR";

/// Filename holding every registered patient.
pub const REGISTRY_FILENAME: &str = "registry.bin";

/// Filename holding the waiting queue.
pub const QUEUE_FILENAME: &str = "queue.bin";

/// Default aggregate capacity of the waiting queue across all levels.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Maximum number of procedures kept in a patient's history.
pub const HISTORY_CAPACITY: usize = 10;

/// Maximum length of a single procedure description, in characters.
pub const PROCEDURE_MAX_CHARS: usize = 100;

/// Magic bytes opening the registry file.
pub const REGISTRY_MAGIC: [u8; 4] = *b"TRGR";

/// Magic bytes opening the queue file.
pub const QUEUE_MAGIC: [u8; 4] = *b"TRGQ";

/// Current on-disk format version for both files.
pub const FORMAT_VERSION: u32 = 1;
