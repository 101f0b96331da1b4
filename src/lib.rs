//! Headunit Core
//!
//! Channel service engine for head-unit projection sessions: audio and video
//! sinks, microphone, sensor and input sources, the control channel and the session
//! orchestrator that starts them and shuts them down together.

pub mod config;
pub mod device;
pub mod error;
pub mod service;
pub mod session;
pub mod shutdown;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::HeadUnitConfig;
pub use error::{ConfigError, ServiceError, SessionError, TransportError};
pub use session::{DeviceSet, SessionEvent, SessionOrchestrator, SessionPhase};
pub use shutdown::{ShutdownReport, ShutdownToken};
pub use transport::{ChannelId, LoopbackTransport, PeerEndpoint, Transport};
