use thiserror::Error;

use crate::service::ChannelState;
use crate::transport::ChannelId;

/// Failures reported by the transport facade.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The pending operation was cancelled because the channel is shutting down.
    #[error("operation aborted")]
    OperationAborted,
    #[error("transport disconnected")]
    Disconnected,
    #[error("send failed: {message}")]
    SendFailed { message: String },
    #[error("receive failed: {message}")]
    ReceiveFailed { message: String },
}

impl TransportError {
    pub fn send_failed<S: Into<String>>(message: S) -> Self {
        Self::SendFailed {
            message: message.into(),
        }
    }

    pub fn receive_failed<S: Into<String>>(message: S) -> Self {
        Self::ReceiveFailed {
            message: message.into(),
        }
    }

    pub fn is_operation_aborted(&self) -> bool {
        matches!(self, Self::OperationAborted)
    }
}

/// Failures observed while talking to a channel service from the outside.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("channel service {channel} is no longer running")]
    ServiceGone { channel: ChannelId },
    #[error("channel service {channel} did not acknowledge shutdown in time")]
    ShutdownTimeout { channel: ChannelId },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("media payload on {channel} without an active session")]
    WriteWithoutSession { channel: ChannelId },
    #[error("start indication on {channel} in state {state}")]
    UnexpectedStartIndication {
        channel: ChannelId,
        state: ChannelState,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session already started")]
    AlreadyStarted,
    #[error("session is not running")]
    NotRunning,
    #[error("session already stopped")]
    AlreadyStopped,
    #[error("no output device registered for {channel}")]
    MissingDevice { channel: ChannelId },
    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}
