use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    #[error("action {action} is outside the action space [0, {n_actions})")]
    InvalidAction { action: usize, n_actions: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Failures while writing or reading a value table checkpoint.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("checkpoint io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("checkpoint entry has {found} values, expected {expected}")]
    LengthMismatch { expected: usize, found: usize },
    #[error(transparent)]
    Agent(#[from] AgentError),
}
