use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use crate::device::InputEvent;
use crate::error::TransportError;
use crate::session::SessionEvent;
use crate::shutdown::ShutdownToken;
use crate::telemetry::events::record_channel_error;
use crate::transport::{ChannelId, OutboundMessage, SessionId, Transport};

/// Per-channel protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    OpenPending,
    Open,
    Setup,
    Ready,
    Active,
    Paused,
    Stopping,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Closed => "closed",
            ChannelState::OpenPending => "open_pending",
            ChannelState::Open => "open",
            ChannelState::Setup => "setup",
            ChannelState::Ready => "ready",
            ChannelState::Active => "active",
            ChannelState::Paused => "paused",
            ChannelState::Stopping => "stopping",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event pulled from a locally attached device stream.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalEvent {
    Input(InputEvent),
    Capture(Bytes),
}

pub(crate) enum LocalStream {
    Input(mpsc::Receiver<InputEvent>),
    Capture(mpsc::Receiver<Bytes>),
}

impl LocalStream {
    pub(crate) async fn recv(&mut self) -> Option<LocalEvent> {
        match self {
            LocalStream::Input(events) => events.recv().await.map(LocalEvent::Input),
            LocalStream::Capture(chunks) => chunks.recv().await.map(LocalEvent::Capture),
        }
    }
}

/// Everything a channel handler may touch while the actor runs one of its
/// callbacks.
pub struct ChannelContext {
    channel: ChannelId,
    transport: Arc<dyn Transport>,
    token: ShutdownToken,
    state: ChannelState,
    session: Option<SessionId>,
    local_input: Option<LocalStream>,
    events: broadcast::Sender<SessionEvent>,
    stop_on_error: bool,
    self_stop_requested: bool,
}

impl ChannelContext {
    pub(crate) fn new(
        channel: ChannelId,
        transport: Arc<dyn Transport>,
        token: ShutdownToken,
        events: broadcast::Sender<SessionEvent>,
        stop_on_error: bool,
    ) -> Self {
        Self {
            channel,
            transport,
            token,
            state: ChannelState::Closed,
            session: None,
            local_input: None,
            events,
            stop_on_error,
            self_stop_requested: false,
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn set_state(&mut self, next: ChannelState) {
        if self.state != next {
            debug!(
                target: "channel_service",
                channel = %self.channel,
                from = self.state.as_str(),
                to = next.as_str(),
                "channel state changed"
            );
            self.state = next;
        }
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn bind_session(&mut self, session: SessionId) {
        self.session = Some(session);
    }

    pub fn clear_session(&mut self) -> Option<SessionId> {
        self.session.take()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.token.is_triggered()
    }

    /// Sends `message` and reports whether it went out. A failed send has
    /// already been routed through [`ChannelContext::on_channel_error`].
    pub async fn send(&mut self, message: OutboundMessage) -> bool {
        let kind = message.kind();
        let result = self
            .token
            .guard(self.transport.send(self.channel, message))
            .await;

        match result {
            Ok(()) => true,
            Err(err) => {
                debug!(target: "channel_service", channel = %self.channel, kind, "send failed");
                self.on_channel_error(&err);
                false
            }
        }
    }

    /// Classifies a transport failure. Aborts caused by our own shutdown are
    /// expected; anything else is reported and, for poll-driven channels,
    /// turns into a local stop.
    pub fn on_channel_error(&mut self, err: &TransportError) {
        if err.is_operation_aborted() && self.token.is_triggered() {
            debug!(
                target: "channel_service",
                channel = %self.channel,
                "operation aborted during shutdown"
            );
            return;
        }

        error!(target: "channel_service", channel = %self.channel, %err, "channel error");
        record_channel_error(self.channel, err, self.stop_on_error);

        if self.stop_on_error && !self.self_stop_requested {
            info!(
                target: "channel_service",
                channel = %self.channel,
                "stopping channel after unexpected error"
            );
            self.token.trigger();
            self.self_stop_requested = true;
        }
    }

    pub fn publish(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!(
                target: "channel_service",
                channel = %self.channel,
                "no session event subscribers"
            );
        }
    }

    /// Attaches a local event stream; it replaces any previous one.
    pub fn attach_local_input(&mut self, events: mpsc::Receiver<InputEvent>) {
        self.local_input = Some(LocalStream::Input(events));
    }

    /// Attaches a capture stream; it replaces any previous one.
    pub fn attach_capture(&mut self, chunks: mpsc::Receiver<Bytes>) {
        self.local_input = Some(LocalStream::Capture(chunks));
    }

    pub fn detach_local_input(&mut self) {
        self.local_input = None;
    }

    pub(crate) fn local_input_mut(&mut self) -> &mut Option<LocalStream> {
        &mut self.local_input
    }

    pub(crate) fn take_self_stop_request(&mut self) -> bool {
        std::mem::take(&mut self.self_stop_requested)
    }

    pub(crate) fn token(&self) -> &ShutdownToken {
        &self.token
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}
