use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use tracing::debug;

use crate::error::TransportError;

use super::{ChannelId, InboundMessage, OutboundMessage, Transport};

struct Lane {
    inbound_rx: AsyncMutex<mpsc::UnboundedReceiver<InboundMessage>>,
    cancelled: AtomicBool,
    cancel_notify: Notify,
}

impl Lane {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// In-process transport wired to a [`PeerEndpoint`].
///
/// Each channel gets its own inbound queue; everything the head unit sends
/// lands on a single outbound stream the peer side can inspect in order.
pub struct LoopbackTransport {
    lanes: HashMap<ChannelId, Lane>,
    outbound_tx: mpsc::UnboundedSender<(ChannelId, OutboundMessage)>,
    send_failures: Mutex<HashMap<ChannelId, TransportError>>,
}

/// The mobile-device side of a [`LoopbackTransport`].
pub struct PeerEndpoint {
    inbound: HashMap<ChannelId, mpsc::UnboundedSender<InboundMessage>>,
    outbound_rx: mpsc::UnboundedReceiver<(ChannelId, OutboundMessage)>,
}

impl LoopbackTransport {
    pub fn new() -> (Arc<Self>, PeerEndpoint) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let mut lanes = HashMap::new();
        let mut inbound = HashMap::new();

        for channel in ChannelId::ALL {
            let (tx, rx) = mpsc::unbounded_channel();
            inbound.insert(channel, tx);
            lanes.insert(
                channel,
                Lane {
                    inbound_rx: AsyncMutex::new(rx),
                    cancelled: AtomicBool::new(false),
                    cancel_notify: Notify::new(),
                },
            );
        }

        let transport = Arc::new(Self {
            lanes,
            outbound_tx,
            send_failures: Mutex::new(HashMap::new()),
        });

        (
            transport,
            PeerEndpoint {
                inbound,
                outbound_rx,
            },
        )
    }

    /// Makes every following send on `channel` fail with `error`.
    pub fn fail_sends(&self, channel: ChannelId, error: TransportError) {
        self.send_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel, error);
    }

    pub fn clear_send_failures(&self, channel: ChannelId) {
        self.send_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&channel);
    }

    /// Lifts a previous [`Transport::cancel`] so the channel can serve the
    /// next session.
    pub fn reopen(&self, channel: ChannelId) {
        if let Some(lane) = self.lanes.get(&channel) {
            lane.cancelled.store(false, Ordering::Release);
        }
    }

    pub fn is_cancelled(&self, channel: ChannelId) -> bool {
        self.lanes
            .get(&channel)
            .map(Lane::is_cancelled)
            .unwrap_or(true)
    }

    fn lane(&self, channel: ChannelId) -> Result<&Lane, TransportError> {
        self.lanes
            .get(&channel)
            .ok_or_else(|| TransportError::receive_failed(format!("unknown channel {channel}")))
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn receive(&self, channel: ChannelId) -> Result<InboundMessage, TransportError> {
        let lane = self.lane(channel)?;

        let cancelled = lane.cancel_notify.notified();
        tokio::pin!(cancelled);
        cancelled.as_mut().enable();

        if lane.is_cancelled() {
            return Err(TransportError::OperationAborted);
        }

        let mut inbound_rx = lane.inbound_rx.lock().await;
        tokio::select! {
            biased;

            _ = &mut cancelled => Err(TransportError::OperationAborted),
            message = inbound_rx.recv() => message.ok_or(TransportError::Disconnected),
        }
    }

    async fn send(
        &self,
        channel: ChannelId,
        message: OutboundMessage,
    ) -> Result<(), TransportError> {
        if self.lane(channel)?.is_cancelled() {
            return Err(TransportError::OperationAborted);
        }

        let injected = self
            .send_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .cloned();
        if let Some(error) = injected {
            return Err(error);
        }

        debug!(
            target: "transport",
            %channel,
            kind = message.kind(),
            "loopback send"
        );

        self.outbound_tx
            .send((channel, message))
            .map_err(|_| TransportError::Disconnected)
    }

    fn cancel(&self, channel: ChannelId) {
        if let Some(lane) = self.lanes.get(&channel) {
            lane.cancelled.store(true, Ordering::Release);
            lane.cancel_notify.notify_waiters();
        }
    }
}

impl PeerEndpoint {
    /// Queues `message` as if the peer had sent it on `channel`.
    pub fn deliver(&self, channel: ChannelId, message: InboundMessage) -> bool {
        self.inbound
            .get(&channel)
            .map(|tx| tx.send(message).is_ok())
            .unwrap_or(false)
    }

    pub async fn next_sent(&mut self) -> Option<(ChannelId, OutboundMessage)> {
        self.outbound_rx.recv().await
    }

    pub fn try_next_sent(&mut self) -> Option<(ChannelId, OutboundMessage)> {
        self.outbound_rx.try_recv().ok()
    }

    /// Everything sent so far, in order.
    pub fn drain_sent(&mut self) -> Vec<(ChannelId, OutboundMessage)> {
        let mut sent = Vec::new();
        while let Ok(entry) = self.outbound_rx.try_recv() {
            sent.push(entry);
        }
        sent
    }

    /// Closes the peer's side of `channel`; pending receives fail with
    /// [`TransportError::Disconnected`].
    pub fn hang_up(&mut self, channel: ChannelId) {
        self.inbound.remove(&channel);
    }
}
