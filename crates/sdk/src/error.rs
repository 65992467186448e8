//! Error types for the SDK and its transport.

use std::time::Duration;

/// Failure of a single control-plane HTTP exchange.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The control plane answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network: {0}")]
    Network(String),
    #[error("timeout: {0}")]
    Timeout(String),
    /// The response body did not match the expected document.
    #[error("decode: {0}")]
    Decode(String),
}

impl TransportError {
    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The control plane no longer knows this machine's registration.
    pub fn is_gone(&self) -> bool {
        self.status() == Some(inf_protocol::STATUS_GONE)
    }
}

/// Convert a `reqwest::Error` into a [`TransportError`].
pub fn from_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_decode() {
        TransportError::Decode(e.to_string())
    } else if let Some(status) = e.status() {
        TransportError::Status {
            status: status.as_u16(),
            body: e.to_string(),
        }
    } else {
        TransportError::Network(e.to_string())
    }
}

/// Top-level SDK error.
#[derive(thiserror::Error, Debug)]
pub enum SdkError {
    #[error("config: {0}")]
    Config(String),

    #[error("tool '{0}' is already registered")]
    DuplicateName(String),

    #[error("tool '{0}' must be registered before polling starts")]
    FrozenRegistry(String),

    #[error("invalid tool '{name}': {reason}")]
    InvalidTool { name: String, reason: String },

    #[error("unsupported schema for tool '{name}': {reason}")]
    UnsupportedSchema { name: String, reason: String },

    #[error("machine registration failed: {0}")]
    Registration(String),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("run creation failed: {0}")]
    RunCreation(String),

    #[error("run {run_id} still in flight after {waited:?}")]
    PollTimeout { run_id: String, waited: Duration },

    #[error("polling agent is already running")]
    AlreadyStarted,

    #[error("failed to handle messages: {0:?}")]
    Batch(Vec<String>),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl SdkError {
    /// Local, synchronous registration errors. Never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateName(_)
                | Self::FrozenRegistry(_)
                | Self::InvalidTool { .. }
                | Self::UnsupportedSchema { .. }
        )
    }

    pub fn is_poll_timeout(&self) -> bool {
        matches!(self, Self::PollTimeout { .. })
    }

    /// The control plane answered 410: this machine's registration is stale.
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_gone())
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gone_is_detected_from_status() {
        let err = TransportError::Status {
            status: 410,
            body: "gone".into(),
        };
        assert!(err.is_gone());
        assert_eq!(err.status(), Some(410));
        assert!(!TransportError::Network("reset".into()).is_gone());
    }

    #[test]
    fn validation_family() {
        assert!(SdkError::DuplicateName("a".into()).is_validation());
        assert!(SdkError::FrozenRegistry("a".into()).is_validation());
        assert!(!SdkError::Registration("x".into()).is_validation());
        assert!(!SdkError::from(TransportError::Network("x".into())).is_validation());
    }
}
