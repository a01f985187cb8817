//! Error types for the promote orchestration core.

use thiserror::Error;

/// Errors surfaced by the bulk job submission/status API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BulkApiError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Decode error: {0}")]
    Decode(String),
}

impl BulkApiError {
    /// 401/403 responses. Never retried.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Http { status, .. } if *status == 401 || *status == 403)
    }

    /// Failures worth another attempt: transport errors and any non-auth HTTP error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } => !self.is_auth(),
            Self::Transport(_) => true,
            Self::Decode(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PromoteError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Bulk job API error: {0}")]
    BulkApi(#[from] BulkApiError),
    #[error("Worker trigger error: {0}")]
    Trigger(String),
    #[error("Activation host error: {0}")]
    Activation(String),
    #[error("Instance file missing for {instance_key}")]
    MissingInstance { instance_key: String },
    #[error("Run for {instance_key} is still in progress (activation {activation_handle:?})")]
    RunInProgress {
        instance_key: String,
        activation_handle: Option<String>,
    },
    #[error("Orchestration error: {0}")]
    Orchestration(String),
}

impl From<serde_json::Error> for PromoteError {
    fn from(error: serde_json::Error) -> Self {
        PromoteError::Serialization(format!("JSON serialization error: {error}"))
    }
}

impl From<std::io::Error> for PromoteError {
    fn from(error: std::io::Error) -> Self {
        PromoteError::Storage(error.to_string())
    }
}

impl From<config::ConfigError> for PromoteError {
    fn from(error: config::ConfigError) -> Self {
        PromoteError::Configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PromoteError>;
