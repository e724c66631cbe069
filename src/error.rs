use thiserror::Error;

/// Errors surfaced by the reconciliation core.
///
/// None of these are fatal to the process: polling callers log and skip
/// the cycle, storage failures degrade to in-memory state, and stale
/// responses are discarded silently before an error is ever produced.
#[derive(Error, Debug)]
pub enum DealwatchError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, DealwatchError>;
