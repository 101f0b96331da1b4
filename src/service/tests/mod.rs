mod sensor;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use crate::session::SessionEvent;
use crate::transport::{
    ChannelId, InboundMessage, LoopbackTransport, MessageStatus, OutboundMessage, PeerEndpoint,
};

use super::{spawn_service, ChannelHandler, RunningService};

const STOP_DEADLINE: Duration = Duration::from_secs(5);

pub(super) struct Harness {
    pub(super) channel: ChannelId,
    pub(super) transport: Arc<LoopbackTransport>,
    pub(super) peer: PeerEndpoint,
    pub(super) service: RunningService,
    pub(super) events: broadcast::Receiver<SessionEvent>,
}

/// Spawns `handler` on a loopback transport and starts it.
pub(super) async fn started<H: ChannelHandler>(handler: H) -> Harness {
    let channel = handler.channel_id();
    let (transport, peer) = LoopbackTransport::new();
    let (events_tx, events) = broadcast::channel(16);
    let service = spawn_service(handler, transport.clone(), events_tx, 8);
    service.handle().start().await.expect("service starts");

    Harness {
        channel,
        transport,
        peer,
        service,
        events,
    }
}

impl Harness {
    pub(super) fn deliver(&self, message: InboundMessage) {
        assert!(self.peer.deliver(self.channel, message), "peer lane open");
    }

    pub(super) async fn next_sent(&mut self) -> OutboundMessage {
        let (channel, message) = timeout(Duration::from_secs(1), self.peer.next_sent())
            .await
            .expect("message sent in time")
            .expect("transport open");
        assert_eq!(channel, self.channel);
        message
    }

    pub(super) async fn open(&mut self) {
        self.deliver(InboundMessage::ChannelOpenRequest { priority: 0 });
        assert_eq!(
            self.next_sent().await,
            OutboundMessage::ChannelOpenResponse {
                status: MessageStatus::Success
            }
        );
    }

    pub(super) async fn stop(&self) {
        self.service
            .handle()
            .stop(STOP_DEADLINE)
            .await
            .expect("stop acknowledged");
    }
}
