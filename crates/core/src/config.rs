//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! or static file paths from inside the data structures, so tests can point every service at
//! its own temporary directory.

use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_QUEUE_CAPACITY, QUEUE_FILENAME, REGISTRY_FILENAME,
};
use crate::{TriageError, TriageResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    queue_capacity: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::InvalidInput`] if `queue_capacity` is zero or `data_dir` is empty.
    pub fn new(data_dir: PathBuf, queue_capacity: usize) -> TriageResult<Self> {
        if queue_capacity == 0 {
            return Err(TriageError::InvalidInput(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if data_dir.as_os_str().is_empty() {
            return Err(TriageError::InvalidInput(
                "data_dir cannot be empty".into(),
            ));
        }

        Ok(Self {
            data_dir,
            queue_capacity,
        })
    }

    /// Configuration with the default queue capacity.
    pub fn with_data_dir(data_dir: PathBuf) -> TriageResult<Self> {
        Self::new(data_dir, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Path of the file holding every registered patient.
    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join(REGISTRY_FILENAME)
    }

    /// Path of the file holding the waiting queue.
    pub fn queue_path(&self) -> PathBuf {
        self.data_dir.join(QUEUE_FILENAME)
    }
}

/// Resolve the data directory without reading environment variables.
///
/// Front ends read `TRIAGE_DATA_DIR` themselves and pass the value (or a command-line override)
/// in here. Blank values fall back to `data/` relative to the working directory.
pub fn resolve_data_dir(override_dir: Option<PathBuf>) -> PathBuf {
    override_dir
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_under_data_dir() {
        let cfg = CoreConfig::with_data_dir(PathBuf::from("/tmp/er")).unwrap();
        assert_eq!(cfg.registry_path(), PathBuf::from("/tmp/er/registry.bin"));
        assert_eq!(cfg.queue_path(), PathBuf::from("/tmp/er/queue.bin"));
        assert_eq!(cfg.queue_capacity(), DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = CoreConfig::new(PathBuf::from("data"), 0);
        assert!(matches!(result, Err(TriageError::InvalidInput(_))));
    }

    #[test]
    fn test_empty_data_dir_rejected() {
        let result = CoreConfig::new(PathBuf::new(), 5);
        assert!(matches!(result, Err(TriageError::InvalidInput(_))));
    }

    #[test]
    fn test_resolve_data_dir() {
        assert_eq!(resolve_data_dir(None), PathBuf::from("data"));
        assert_eq!(resolve_data_dir(Some(PathBuf::new())), PathBuf::from("data"));
        assert_eq!(
            resolve_data_dir(Some(PathBuf::from("/srv/er"))),
            PathBuf::from("/srv/er")
        );
    }
}
