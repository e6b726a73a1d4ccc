use vigil_archive::ArchiveError;
use vigil_core::StateError;
use vigil_storage::StorageError;

/// All errors the engine can return to its caller.
///
/// Everything here is retryable from the queue's perspective except
/// `Decode` (the payload will never parse on redelivery) and `State`
/// (the aggregate is inconsistent and redelivery reproduces it). The
/// expected no-op conditions -- stale result, deleted check -- are not
/// errors at all; they are [`crate::WorkerOutcome`] variants.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    State(#[from] StateError),

    /// The queue payload is not a valid serialized result.
    #[error("malformed result payload: {0}")]
    Decode(String),

    /// A concurrent result fetch task failed to complete.
    #[error("result fetch task failed: {0}")]
    Join(String),

    /// The alert sink rejected a payload.
    #[error("alert sink failed: {0}")]
    Alert(String),
}
