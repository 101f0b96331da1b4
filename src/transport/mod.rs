//! Transport facade seen by the channel services.
//!
//! Framing, encryption and device I/O live behind [`Transport`]; services only
//! exchange typed messages keyed by [`ChannelId`].

mod loopback;
pub mod message;

pub use loopback::{LoopbackTransport, PeerEndpoint};
pub use message::*;

use async_trait::async_trait;

use crate::error::TransportError;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Waits for the next message on `channel`.
    ///
    /// At most one receive is outstanding per channel at any time.
    async fn receive(&self, channel: ChannelId) -> Result<InboundMessage, TransportError>;

    async fn send(&self, channel: ChannelId, message: OutboundMessage)
        -> Result<(), TransportError>;

    /// Rejects every pending and future operation on `channel` with
    /// [`TransportError::OperationAborted`].
    fn cancel(&self, channel: ChannelId);
}
