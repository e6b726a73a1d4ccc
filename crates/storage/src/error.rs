/// All errors that can be returned by a CheckStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The check is missing or soft-deleted. This is an expected
    /// steady-state condition during deletion races; callers treat it as a
    /// no-op, never as a retryable failure.
    #[error("check not found: {customer_id}/{check_id}")]
    CheckNotFound {
        customer_id: String,
        check_id: String,
    },

    /// No state transition log entry with the given id.
    #[error("transition log entry not found: {id}")]
    TransitionNotFound { id: i64 },

    /// A backend-specific storage error (connection, lock wait, query).
    /// These propagate to the queue caller for redelivery.
    #[error("storage backend error: {0}")]
    Backend(String),
}
