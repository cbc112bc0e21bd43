//! Error types for the editor
//!
//! Only I/O-bound work (snapshots, config, clipboard storage) can fail.
//! Edits themselves never error; they report a [`MutationResult`].
//!
//! [`MutationResult`]: crate::MutationResult

use pagecraft_common::CommonError;
use thiserror::Error;

use crate::store::InvariantViolation;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(#[from] InvariantViolation),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Clipboard storage error: {0}")]
    ClipboardStorage(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}
