/// All errors that can be returned by a ResultArchive implementation.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// No object stored under the given key.
    #[error("archive object not found: {key}")]
    NotFound { key: String },

    /// A backend-specific archive error (connection, serialization).
    #[error("archive backend error: {0}")]
    Backend(String),
}
