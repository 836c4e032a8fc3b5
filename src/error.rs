//! Errors common to this crate

/// Errors that can occur while running a sync, talking to an adapter, or loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("missing or invalid configuration: {0}")]
    Config(String),

    #[error("could not reach {system}: {detail}")]
    Connection { system: &'static str, detail: String },

    #[error("{system} item {id:?} does not exist")]
    NotFound { system: &'static str, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{system} storage command failed: {detail}")]
    Store { system: &'static str, detail: String },

    #[error("sync-state store error: {0}")]
    SyncState(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type SyncResult<T> = Result<T, SyncError>;
