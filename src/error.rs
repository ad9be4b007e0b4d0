//! Typed failures surfaced by graph construction.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// The log source could not be read (network, file, parse failure).
    #[error("repository access failed: {0}")]
    Repository(String),

    /// The user cancelled a long-running fetch or analysis.
    #[error("operation cancelled")]
    Cancelled,

    /// The cached log contradicts the request (e.g. a peg revision newer
    /// than the fetched head).
    #[error("inconsistent change log: {0}")]
    Inconsistency(String),
}

impl GraphError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GraphError::Cancelled)
    }
}
