// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Failure to encode or decode an `LB_EVENT` line.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    #[error("line does not start with the LB_EVENT prefix")]
    MissingPrefix,
    #[error("missing required field {0:?}")]
    MissingField(String),
    #[error("field {field:?} has invalid value {value:?}")]
    InvalidValue { field: String, value: String },
    #[error("unterminated quoted value")]
    UnterminatedQuote,
}
