use thiserror::Error;

/// The only failures callers of the remote client ever see.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Remote service unreachable: {message}")]
    Connection { message: String },

    #[error("Remote request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Remote service returned {status}: {message}")]
    Service { status: u16, message: String },
}

impl RemoteError {
    /// Connection failures, timeouts, 5xx and 408 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Connection { .. } | RemoteError::Timeout { .. } => true,
            RemoteError::Service { status, .. } => *status >= 500 || *status == 408,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}
