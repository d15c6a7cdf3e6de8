// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use lb_core::JournalErrorKind;

/// Failure reading, writing, or mutating a [`crate::Journal`].
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("journal at {path:?} is corrupt: {source}")]
    Corrupt { path: String, #[source] source: serde_json::Error },
    #[error("journal snapshot at {path:?} does not match its recorded digest")]
    DigestMismatch { path: String },
    #[error("journal config snapshot is incompatible with the supplied config: {reason}")]
    SchemaMismatch { reason: String },
    #[error(transparent)]
    InvalidTransition(#[from] lb_core::InvalidTransition),
    #[error("journal I/O failed at {path:?}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}

impl JournalError {
    /// The taxonomy kind this error belongs to, for exit-code / UI mapping.
    pub fn kind(&self) -> JournalErrorKind {
        match self {
            JournalError::Corrupt { .. } => JournalErrorKind::Corrupt,
            JournalError::DigestMismatch { .. } => JournalErrorKind::Corrupt,
            JournalError::SchemaMismatch { .. } => JournalErrorKind::SchemaMismatch,
            JournalError::InvalidTransition(_) => JournalErrorKind::InvalidTransition,
            JournalError::Io { .. } => JournalErrorKind::Io,
        }
    }
}

/// Failure enumerating or resolving prior runs under an output root.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("no run found matching {0:?}")]
    NotFound(String),
    #[error("failed to read run root {path:?}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error(transparent)]
    Journal(#[from] JournalError),
}
