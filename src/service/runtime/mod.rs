mod handle;
mod state;
mod worker;

pub use handle::{RunningService, ServiceHandle};
pub use state::{ChannelContext, ChannelState, LocalEvent};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::session::SessionEvent;
use crate::shutdown::ShutdownToken;
use crate::transport::{ChannelId, InboundMessage, ServiceDescriptor, Transport};

use self::worker::ChannelWorker;

/// How a channel produces outbound traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    /// Only reacts to peer messages and local input.
    MessageDriven,
    /// Additionally pushes samples on a fixed cadence. Unexpected errors stop
    /// the channel.
    PollDriven(Duration),
}

/// Channel-specific half of a service. The generic actor owns the open
/// handshake, receive re-arming, the poll timer and shutdown; handlers only
/// see the messages and events of their own sub-protocol.
#[async_trait]
pub trait ChannelHandler: Send + 'static {
    fn channel_id(&self) -> ChannelId;

    fn drive_mode(&self) -> DriveMode {
        DriveMode::MessageDriven
    }

    /// Builds the capability descriptor from live device state.
    fn fill_features(&self) -> ServiceDescriptor;

    fn open_device(&mut self) -> bool {
        true
    }

    async fn on_start(&mut self, _ctx: &mut ChannelContext) {}

    async fn on_message(&mut self, ctx: &mut ChannelContext, message: InboundMessage);

    fn on_pause(&mut self, _ctx: &mut ChannelContext) {}

    /// Runs after the channel went back to `Active`; the handler may move it
    /// elsewhere.
    fn on_resume(&mut self, _ctx: &mut ChannelContext) {}

    async fn on_poll(&mut self, _ctx: &mut ChannelContext) {}

    async fn on_local_event(&mut self, _ctx: &mut ChannelContext, _event: LocalEvent) {}

    /// Releases the device. Called exactly once.
    fn on_stop(&mut self, ctx: &mut ChannelContext);
}

/// Spawns the actor for `handler` with a fresh shutdown token.
pub fn spawn_service<H: ChannelHandler>(
    handler: H,
    transport: Arc<dyn Transport>,
    events: broadcast::Sender<SessionEvent>,
    mailbox_capacity: usize,
) -> RunningService {
    let channel = handler.channel_id();
    let stop_on_error = matches!(handler.drive_mode(), DriveMode::PollDriven(_));
    let token = ShutdownToken::new();
    let (command_tx, command_rx) = mpsc::channel(mailbox_capacity.max(1));

    let ctx = ChannelContext::new(
        channel,
        Arc::clone(&transport),
        token.clone(),
        events,
        stop_on_error,
    );
    let task = ChannelWorker::new(handler, ctx, command_rx).spawn();
    let handle = ServiceHandle::new(channel, command_tx, token, transport);

    RunningService::new(handle, task)
}
