//! Typed failure taxonomy for synchronization operations.
//!
//! Every component boundary returns these types; the orchestrator decides
//! whether a failure aborts the run or only the current unit of work. The
//! CLI converts to `anyhow` at the binary boundary.

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Reason an authentication attempt failed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credential material unusable before any network call was made.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The verification call against the read-only endpoint did not
    /// return HTTP 200.
    #[error("session verification failed (HTTP {0})")]
    VerificationFailed(u16),

    /// Transport failure during login or verification.
    #[error("network error during login: {0}")]
    Network(String),
}

/// Failure taxonomy for the synchronization engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Credential or session invalid. Fatal to the run, no retry.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Transient transport failure. May be retried at the orchestration
    /// level; nothing inside the core retries silently.
    #[error("network error: {0}")]
    Network(String),

    /// The remote rejected a write whose base version was stale. The
    /// operator must re-fetch and decide; never auto-merged.
    #[error("version conflict on page {page_id}: {detail}")]
    Conflict { page_id: String, detail: String },

    /// Page, row, or backup not present.
    #[error("not found: {0}")]
    NotFound(String),

    /// The session lacks permission for the requested page.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Table markup is missing an expected structural marker.
    #[error("table structure error: {0}")]
    Structure(String),

    /// Refused to remove a row carrying header cells.
    #[error("last table row is a header row; refusing to remove it")]
    HeaderProtected,

    /// A mapped row is missing required data. The record is skipped and
    /// the pipeline continues.
    #[error("invalid row: {0}")]
    Validation(String),

    /// A backup could not be written. No mutation may proceed.
    #[error("backup storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}
