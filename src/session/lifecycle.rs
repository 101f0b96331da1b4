//! Session phases and the events broadcast while a session runs.

use std::time::SystemTime;

use crate::transport::ChannelId;

/// Orchestrator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Running => "running",
            SessionPhase::Stopping => "stopping",
            SessionPhase::Stopped => "stopped",
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEndReason {
    ProjectionReleased,
    ByeByeRequested { reason: i32 },
    ByeByeAcknowledged,
    ControlChannelFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The peer handed the display back to the native UI.
    ProjectionReleased { channel: ChannelId },
    ByeByeRequested { reason: i32 },
    ByeByeAcknowledged,
    ControlChannelFailed { reason: String },
    PhaseChanged(PhaseUpdate),
}

impl SessionEvent {
    /// Maps end triggers to their reason; informational events yield `None`.
    pub fn end_reason(&self) -> Option<SessionEndReason> {
        match self {
            SessionEvent::ProjectionReleased { .. } => Some(SessionEndReason::ProjectionReleased),
            SessionEvent::ByeByeRequested { reason } => {
                Some(SessionEndReason::ByeByeRequested { reason: *reason })
            }
            SessionEvent::ByeByeAcknowledged => Some(SessionEndReason::ByeByeAcknowledged),
            SessionEvent::ControlChannelFailed { reason } => {
                Some(SessionEndReason::ControlChannelFailed {
                    reason: reason.clone(),
                })
            }
            SessionEvent::PhaseChanged(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseUpdate {
    pub phase: SessionPhase,
    pub issued_at: SystemTime,
}

impl PhaseUpdate {
    pub fn new(phase: SessionPhase) -> Self {
        Self {
            phase,
            issued_at: SystemTime::now(),
        }
    }
}
