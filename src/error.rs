use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanqError {
    QueueError(String),
    StateTransitionError(String),
    CommandError(String),
    ConfigurationError(String),
}

impl fmt::Display for ScanqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanqError::QueueError(msg) => write!(f, "Queue error: {msg}"),
            ScanqError::StateTransitionError(msg) => write!(f, "State transition error: {msg}"),
            ScanqError::CommandError(msg) => write!(f, "Command error: {msg}"),
            ScanqError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for ScanqError {}

pub type Result<T> = std::result::Result<T, ScanqError>;
