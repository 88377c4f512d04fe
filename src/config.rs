//! # Engine Configuration
//!
//! Timing constants and limits for the synchronization controller and the
//! merge engine. Every field has a default, so a config file only lists what
//! it changes:
//!
//! ```
//! use bindery::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{"capture_debounce_ms": 250}"#).unwrap();
//! assert_eq!(config.capture_debounce().as_millis(), 250);
//! assert_eq!(config.grid_cells, 4);
//! ```
//!
//! ## Timings
//!
//! ```text
//! edit ──┬── capture_debounce ──► capture
//!        │
//! undo ──┼── restore ──┬── restore_grace ──► Ready
//!        │             └── restore_retry ──► one retry on views still loading
//!        │
//! load ──┴── settle_delay ──► initial snapshot
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BinderyError;

/// Tunables for one editing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet period after the last edit before a snapshot is committed.
    pub capture_debounce_ms: u64,
    /// Delay letting a document swap settle before dependent work runs.
    pub settle_delay_ms: u64,
    /// Grace period after a restore during which captures stay blocked.
    pub restore_grace_ms: u64,
    /// Delay before the single restore retry on views still loading.
    pub restore_retry_ms: u64,
    /// Snapshots kept per record; the oldest are dropped first.
    pub max_history: usize,
    /// Number of grid views (2×2 by default).
    pub grid_cells: usize,
    /// Upper bound on copies of a repeatable image.
    pub max_repeat: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capture_debounce_ms: 400,
            settle_delay_ms: 50,
            restore_grace_ms: 150,
            restore_retry_ms: 100,
            max_history: 100,
            grid_cells: 4,
            max_repeat: 50,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, BinderyError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, BinderyError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), BinderyError> {
        if self.max_history == 0 {
            return Err(BinderyError::Config("max_history must be at least 1".into()));
        }
        if self.grid_cells == 0 {
            return Err(BinderyError::Config("grid_cells must be at least 1".into()));
        }
        if self.max_repeat == 0 {
            return Err(BinderyError::Config("max_repeat must be at least 1".into()));
        }
        Ok(())
    }

    #[inline]
    pub fn capture_debounce(&self) -> Duration {
        Duration::from_millis(self.capture_debounce_ms)
    }

    #[inline]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[inline]
    pub fn restore_grace(&self) -> Duration {
        Duration::from_millis(self.restore_grace_ms)
    }

    #[inline]
    pub fn restore_retry(&self) -> Duration {
        Duration::from_millis(self.restore_retry_ms)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.capture_debounce(), Duration::from_millis(400));
        assert_eq!(config.grid_cells, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{"max_history": 5}"#).unwrap();
        assert_eq!(config.max_history, 5);
        assert_eq!(config.settle_delay_ms, 50);
    }

    #[test]
    fn test_zero_grid_rejected() {
        let err = EngineConfig::from_json_str(r#"{"grid_cells": 0}"#).unwrap_err();
        assert!(matches!(err, BinderyError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"restore_grace_ms": 10}}"#).unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.restore_grace(), Duration::from_millis(10));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = EngineConfig::load(Path::new("/nonexistent/bindery.json")).unwrap_err();
        assert!(matches!(err, BinderyError::Io(_)));
    }
}
