//! Shared error taxonomy for the calendar engine.
//!
//! Business-rule violations (`NotFound`, `Validation`, `TerminalState`) are
//! returned to the caller unmodified. `TransientStore` is retryable and is
//! only surfaced once the write boundary exhausts its retry budget.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The addressed record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Malformed key or payload.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Illegal transition attempted on an approved (terminal) record.
    #[error("Record is approved and read-only: {0}")]
    TerminalState(String),

    /// AccessGuard cap exceeded; the operation was not performed.
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Retryable I/O failure at the storage boundary.
    #[error("Transient store failure: {0}")]
    TransientStore(String),

    /// Reserved for optimistic-concurrency checks; writes are currently
    /// last-writer-wins so nothing raises this yet.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl CoreError {
    /// Whether the error is worth retrying at the write boundary.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::TransientStore(_))
    }
}
