//! Error taxonomy for booth control operations.

/// Failure raised by transport, playlist, or session operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayerError {
    /// Input rejected locally before any network call was made.
    #[error("invalid request: {0}")]
    Validation(String),
    /// The remote side answered with a non-success status.
    #[error("{command} rejected by remote (status {status}): {message}")]
    CommandRejected {
        command: String,
        status: u16,
        message: String,
    },
    /// The remote side could not be reached.
    #[error("{command} failed, remote unreachable: {message}")]
    Unreachable { command: String, message: String },
    /// A previous transport command is still outstanding.
    #[error("another transport command is still in flight")]
    Busy,
    /// The remote answered with a payload we could not interpret.
    #[error("unexpected response payload: {0}")]
    Decode(String),
    /// The booth session has not been established yet.
    #[error("booth session not ready: {0}")]
    NotReady(String),
}

impl PlayerError {
    /// Returns `true` when a user-initiated retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::PlayerError;

    #[test]
    fn test_only_unreachable_errors_are_retryable() {
        let unreachable = PlayerError::Unreachable {
            command: "play".to_string(),
            message: "connection refused".to_string(),
        };
        let rejected = PlayerError::CommandRejected {
            command: "play".to_string(),
            status: 404,
            message: "listener not found".to_string(),
        };

        assert!(unreachable.is_retryable());
        assert!(!rejected.is_retryable());
        assert!(!PlayerError::Validation("volume".to_string()).is_retryable());
        assert!(!PlayerError::Busy.is_retryable());
    }

    #[test]
    fn test_display_names_the_failed_command() {
        let rejected = PlayerError::CommandRejected {
            command: "next".to_string(),
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(
            rejected.to_string(),
            "next rejected by remote (status 500): boom"
        );
    }
}
