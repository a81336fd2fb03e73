use serde::{Deserialize, Serialize};
use std::fmt;

/// Consumer state machine positions.
///
/// `Running` is the initial state. `Stopped` is terminal: there is no
/// operation that revives a stopped consumer, a new one must be spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerState {
    /// Actively pulling pending jobs
    Running,
    /// Holding: the in-flight job finishes, no further jobs start
    Paused,
    /// Terminal: the worker loop has ceased
    Stopped,
}

impl ConsumerState {
    /// Check if this is the terminal state (no outgoing transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Check if the consumer is pulling pending jobs
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl Default for ConsumerState {
    fn default() -> Self {
        Self::Running
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

impl std::str::FromStr for ConsumerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "stopped" => Ok(Self::Stopped),
            _ => Err(format!("Invalid consumer state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_check() {
        assert!(ConsumerState::Stopped.is_terminal());
        assert!(!ConsumerState::Running.is_terminal());
        assert!(!ConsumerState::Paused.is_terminal());
    }

    #[test]
    fn test_string_conversion() {
        assert_eq!(ConsumerState::Paused.to_string(), "paused");
        assert_eq!("running".parse::<ConsumerState>().unwrap(), ConsumerState::Running);
        assert!("idle".parse::<ConsumerState>().is_err());
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&ConsumerState::Stopped).unwrap();
        assert_eq!(json, "\"stopped\"");
        let parsed: ConsumerState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ConsumerState::Stopped);
    }
}
