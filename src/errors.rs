/// Failure taxonomy for the storage layer.
///
/// Callers that need to react to a specific failure match on the variant;
/// quota exhaustion in particular is its own variant so recovery logic never
/// has to sniff error messages.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to serialize value for `{key}`: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse stored value for `{key}`: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage quota exceeded while writing `{key}`")]
    QuotaExceeded { key: String },

    #[error("read-back verification failed for `{key}`")]
    VerifyFailed { key: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// True when the failure is quota exhaustion, the one case the save
    /// pipeline retries after purging backups.
    pub fn is_quota(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}
