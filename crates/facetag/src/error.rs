//! Error types for document sessions.

use facetag_ir::CodecError;
use facetag_step::StepError;
use facetag_store::StoreError;
use thiserror::Error;

/// Errors surfaced by [`Workspace`](crate::Workspace) operations.
///
/// Per-item problems inside batch edits are not errors: those items are
/// skipped and counted in the batch report.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The operation needs a loaded document.
    #[error("no document loaded")]
    NotLoaded,

    /// A document or file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request itself is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Stored or embedded metadata cannot be decoded.
    #[error(transparent)]
    CorruptPayload(#[from] CodecError),

    /// The fingerprint store failed; the operation was aborted.
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    /// The model could not be loaded; the session is empty.
    #[error("failed to load document: {0}")]
    LoadFailure(#[source] StepError),

    /// The annotated file could not be produced or written back.
    #[error("failed to write document: {0}")]
    ExportFailure(#[source] StepError),

    /// File system error around the documents directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}
