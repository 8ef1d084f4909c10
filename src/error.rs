use std::time::Duration;

use thiserror::Error;

/// Failure classes the engine distinguishes when deciding how to degrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure or timeout on a remote call.
    Transport,
    /// Health probe or capture-device acquisition failed.
    Availability,
    /// The remote call succeeded but its body was unusable.
    MalformedResponse,
    /// A call arrived while the session was not in the expected state.
    SessionState,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote call returned HTTP {status}")]
    Status { status: u16 },

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("capture device error: {0}")]
    Capture(String),

    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String, raw: String },

    #[error("session state mismatch: {0}")]
    SessionState(String),

    #[error("operation cancelled because the owning session ended")]
    Cancelled,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Transport(_)
            | EngineError::Timeout(_)
            | EngineError::Status { .. }
            | EngineError::Cancelled => ErrorKind::Transport,
            EngineError::Unavailable(_) | EngineError::Capture(_) => ErrorKind::Availability,
            EngineError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            EngineError::SessionState(_) => ErrorKind::SessionState,
        }
    }

    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        EngineError::MalformedResponse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return EngineError::Status {
                status: status.as_u16(),
            };
        }
        if err.is_decode() {
            return EngineError::malformed(err.to_string(), String::new());
        }
        EngineError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            EngineError::Timeout(Duration::from_secs(5)).kind(),
            ErrorKind::Transport
        );
        assert_eq!(EngineError::Status { status: 500 }.kind(), ErrorKind::Transport);
        assert_eq!(
            EngineError::Unavailable("health".into()).kind(),
            ErrorKind::Availability
        );
        assert_eq!(
            EngineError::malformed("no json", "not json at all").kind(),
            ErrorKind::MalformedResponse
        );
        assert_eq!(
            EngineError::SessionState("inactive".into()).kind(),
            ErrorKind::SessionState
        );
    }

    #[test]
    fn test_display_includes_status() {
        let err = EngineError::Status { status: 503 };
        assert_eq!(err.to_string(), "remote call returned HTTP 503");
    }
}
