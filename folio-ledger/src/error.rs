use thiserror::Error;

/// Result alias for code-issuance operations.
pub type SequenceResult<T> = Result<T, SequenceError>;

/// Error type surfaced by the ledger, scanner, and assigner.
///
/// Every variant rolls the enclosing transaction back fully; no partial
/// ledger advance or orphaned record survives a failed attempt.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// Tenant, category, or sede could not be resolved. Not retryable.
    #[error("not found: {0}")]
    NotFound(String),
    /// Unique-constraint collisions on the formatted code outlasted the
    /// retry budget. The whole creation request may be retried.
    #[error("code issuance still colliding after {attempts} attempt(s)")]
    Conflict { attempts: u32 },
    /// The store write lock was not acquired within the busy timeout.
    /// Retryable by the caller with backoff.
    #[error("timed out waiting for the store write lock")]
    LockTimeout,
    /// Transient storage failure; retried internally up to the budget.
    #[error("storage error: {0}")]
    Storage(String),
    /// The scope's numeric space is full; no code can be issued without
    /// widening the format.
    #[error("code space {prefix}* is exhausted ({width} digits)")]
    ScopeExhausted { prefix: String, width: u32 },
}

impl From<rusqlite::Error> for SequenceError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(err, _) => match err.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    Self::LockTimeout
                }
                _ => Self::Storage(value.to_string()),
            },
            _ => Self::Storage(value.to_string()),
        }
    }
}

impl From<std::io::Error> for SequenceError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

/// Whether `err` is a unique-constraint violation, i.e. another writer won
/// the race for the same formatted code.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
