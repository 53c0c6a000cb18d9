//! Error taxonomy shared by the orchestrator, the scenario engine and the backend client.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// The run exists but has no materialized result yet. Absorbed by the orchestrator.
    #[error("run is not ready yet")]
    NotReadyYet,

    #[error("run did not complete within {attempts} poll attempts")]
    Timeout { attempts: u32 },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("backend returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("run {0} is already being watched")]
    AlreadyActive(String),
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        CoreError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Transport(format!("malformed response: {e}"))
    }
}
