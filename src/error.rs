//! # Error Types
//!
//! This module defines error types used throughout the bindery library.
//!
//! Most engine operations are deliberately forgiving (a missing element is
//! skipped, a malformed quantity is coerced), so these variants cover the
//! cases where a call genuinely cannot proceed.

use thiserror::Error;

use crate::record::RecordId;
use crate::sync::ViewRole;

/// Main error type for bindery operations
#[derive(Debug, Error)]
pub enum BinderyError {
    /// Malformed template markup or inline style
    #[error("Parse error: {0}")]
    Parse(String),

    /// The target document view has not finished loading
    #[error("View unavailable: {0}")]
    ViewUnavailable(ViewRole),

    /// A record id outside the loaded dataset
    #[error("Unknown record: {0}")]
    UnknownRecord(RecordId),

    /// An edit or history operation arrived with no active record
    #[error("No active record")]
    NoActiveRecord,

    /// An operation needs a template and none is attached
    #[error("No template loaded")]
    NoTemplate,

    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// JSON (de)serialization error wrapper
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
