/// Errors returned by the remote chat API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request reached the server and was rejected or failed there.
    #[error("request failed: {0}")]
    Request(String),

    /// A room or message id could not be resolved on the remote side.
    #[error("not found: {0}")]
    NotFound(String),

    /// An id did not parse into the backend's identifier format.
    #[error("invalid id {id}: {reason}")]
    InvalidId { id: String, reason: String },

    /// The backend has no equivalent of the requested operation.
    #[error("unsupported by this backend: {0}")]
    Unsupported(&'static str),
}

/// Errors from the local reactive store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no {table} record with id {id}")]
    NotFound { table: &'static str, id: String },

    /// A writer panicked while holding the tables lock.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Errors reading or writing the on-disk settings and session files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no stored session")]
    NoSession,
}
