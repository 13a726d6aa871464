use std::fmt::Display;

use models::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("referenced {kind} {id} not found")]
    ReferenceNotFound { kind: &'static str, id: String },
    #[error("{kind} {id} is still referenced by {count} {referrer} record(s)")]
    ReferenceConflict { kind: &'static str, id: String, referrer: &'static str, count: usize },
    #[error("storage unavailable: {0}")]
    Storage(String),
}

impl ServiceError {
    pub fn not_found(kind: &'static str, id: impl Display) -> Self {
        Self::NotFound { kind, id: id.to_string() }
    }

    pub fn reference_not_found(kind: &'static str, id: impl Display) -> Self {
        Self::ReferenceNotFound { kind, id: id.to_string() }
    }

    pub fn storage(context: &str, err: impl Display) -> Self {
        Self::Storage(format!("{context}: {err}"))
    }

    /// Stable machine-readable kind, surfaced to API clients.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::ReferenceNotFound { .. } => "reference_not_found",
            Self::ReferenceConflict { .. } => "reference_conflict",
            Self::Storage(_) => "storage_unavailable",
        }
    }
}

impl From<ModelError> for ServiceError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Validation(msg) => Self::Validation(msg),
            // A document that breaks its own invariants is unusable, same as an unparsable one.
            ModelError::Integrity(msg) => Self::Storage(format!("document integrity: {msg}")),
        }
    }
}
