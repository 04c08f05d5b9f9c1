use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Everything a call through the session coordinator can end in.
///
/// Errors are `Clone` so one refresh outcome can be handed to every request
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The token endpoint rejected the username/password.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// No response reached us: connection failure or timeout.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The refresh failed or a request was rejected after its single retry.
    /// The caller should send the user back to sign-in.
    #[error("session expired, please sign in again")]
    SessionExpired,

    /// Any other non-2xx answer, passed through for context-specific handling.
    #[error("request failed with status {status}: {body}")]
    RequestFailed { status: StatusCode, body: String },

    /// A 2xx answer whose body or token we could not make sense of.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl SessionError {
    /// Whether the UI should drop its session state and redirect to sign-in.
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, SessionError::SessionExpired)
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SessionError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_expiry_requires_sign_in() {
        assert!(SessionError::SessionExpired.requires_sign_in());
        assert!(!SessionError::InvalidCredentials.requires_sign_in());
        assert!(!SessionError::NetworkUnavailable("timeout".into()).requires_sign_in());
        let failed = SessionError::RequestFailed {
            status: StatusCode::CONFLICT,
            body: "insufficient stock".into(),
        };
        assert!(!failed.requires_sign_in());
        assert_eq!(failed.status(), Some(StatusCode::CONFLICT));
        assert!(failed.to_string().contains("insufficient stock"));
    }
}
