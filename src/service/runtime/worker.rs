use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::transport::{InboundMessage, MessageStatus, OutboundMessage, ServiceDescriptor};

use super::state::{ChannelContext, ChannelState, LocalEvent, LocalStream};
use super::{ChannelHandler, DriveMode};

type ReceiveFuture = Pin<Box<dyn Future<Output = Result<InboundMessage, TransportError>> + Send>>;

pub(crate) enum ServiceCommand {
    Start(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
    Pause(oneshot::Sender<()>),
    Resume(oneshot::Sender<()>),
    FillFeatures(oneshot::Sender<ServiceDescriptor>),
}

enum Wake {
    Command(ServiceCommand),
    MailboxClosed,
    Received(Result<InboundMessage, TransportError>),
    LocalInput(Option<LocalEvent>),
    Tick,
}

/// Actor owning one channel handler. Every callback of the handler runs on
/// this task, so the handler never needs its own locking.
pub(crate) struct ChannelWorker<H> {
    handler: H,
    ctx: ChannelContext,
    mailbox: mpsc::Receiver<ServiceCommand>,
    receive: Option<ReceiveFuture>,
    ticker: Option<Pin<Box<Sleep>>>,
    started: bool,
    halted: bool,
}

impl<H: ChannelHandler> ChannelWorker<H> {
    pub(crate) fn new(
        handler: H,
        ctx: ChannelContext,
        mailbox: mpsc::Receiver<ServiceCommand>,
    ) -> Self {
        Self {
            handler,
            ctx,
            mailbox,
            receive: None,
            ticker: None,
            started: false,
            halted: false,
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(mut self) {
        loop {
            let wake = tokio::select! {
                biased;

                command = self.mailbox.recv() => match command {
                    Some(command) => Wake::Command(command),
                    None => Wake::MailboxClosed,
                },
                received = next_received(&mut self.receive) => Wake::Received(received),
                event = next_local_input(self.ctx.local_input_mut()) => Wake::LocalInput(event),
                _ = next_tick(&mut self.ticker) => Wake::Tick,
            };

            match wake {
                Wake::Command(command) => {
                    if self.handle_command(command).await {
                        break;
                    }
                }
                Wake::MailboxClosed => {
                    debug!(
                        target: "channel_service",
                        channel = %self.ctx.channel(),
                        "service handle dropped"
                    );
                    self.ctx.token().trigger();
                    self.halt();
                    break;
                }
                Wake::Received(result) => self.handle_received(result).await,
                Wake::LocalInput(Some(event)) => {
                    if !self.ctx.is_stop_requested() {
                        self.handler.on_local_event(&mut self.ctx, event).await;
                    }
                }
                Wake::LocalInput(None) => self.ctx.detach_local_input(),
                Wake::Tick => self.handle_tick().await,
            }

            if self.ctx.take_self_stop_request() {
                self.halt();
            }
        }
    }

    /// Returns `true` once the actor should exit.
    async fn handle_command(&mut self, command: ServiceCommand) -> bool {
        match command {
            ServiceCommand::Stop(ack) => {
                self.halt();
                let _ = ack.send(());
                return true;
            }
            ServiceCommand::Start(ack) => {
                self.start().await;
                let _ = ack.send(());
            }
            ServiceCommand::Pause(ack) => {
                if self.ctx.state() == ChannelState::Active {
                    self.handler.on_pause(&mut self.ctx);
                    self.ctx.set_state(ChannelState::Paused);
                }
                let _ = ack.send(());
            }
            ServiceCommand::Resume(ack) => {
                if self.ctx.state() == ChannelState::Paused {
                    self.ctx.set_state(ChannelState::Active);
                    self.handler.on_resume(&mut self.ctx);
                }
                let _ = ack.send(());
            }
            ServiceCommand::FillFeatures(reply) => {
                let _ = reply.send(self.handler.fill_features());
            }
        }
        false
    }

    async fn start(&mut self) {
        let channel = self.ctx.channel();
        if self.halted || self.ctx.is_stop_requested() {
            warn!(target: "channel_service", %channel, "start after stop ignored");
            return;
        }
        if self.started {
            warn!(target: "channel_service", %channel, "service already started");
            return;
        }

        info!(target: "channel_service", %channel, "starting channel service");
        self.started = true;
        self.handler.on_start(&mut self.ctx).await;
        self.arm_receive();
        if let DriveMode::PollDriven(interval) = self.handler.drive_mode() {
            self.schedule_tick(interval);
        }
    }

    async fn handle_received(&mut self, result: Result<InboundMessage, TransportError>) {
        let message = match result {
            Ok(message) => message,
            Err(err) => {
                self.ctx.on_channel_error(&err);
                return;
            }
        };

        if self.ctx.is_stop_requested() {
            debug!(
                target: "channel_service",
                channel = %self.ctx.channel(),
                kind = message.kind(),
                "dropping message received during shutdown"
            );
            return;
        }

        match message {
            InboundMessage::ChannelOpenRequest { priority } => self.open(priority).await,
            other => self.handler.on_message(&mut self.ctx, other).await,
        }

        self.arm_receive();
    }

    async fn open(&mut self, priority: i32) {
        let channel = self.ctx.channel();
        info!(target: "channel_service", %channel, priority, "channel open request");

        self.ctx.set_state(ChannelState::OpenPending);
        let status = if self.handler.open_device() {
            self.ctx.set_state(ChannelState::Open);
            MessageStatus::Success
        } else {
            warn!(target: "channel_service", %channel, "device failed to open");
            self.ctx.set_state(ChannelState::Closed);
            MessageStatus::InternalError
        };

        self.ctx
            .send(OutboundMessage::ChannelOpenResponse { status })
            .await;
    }

    async fn handle_tick(&mut self) {
        let interval = match self.handler.drive_mode() {
            DriveMode::PollDriven(interval) => interval,
            DriveMode::MessageDriven => return,
        };

        if self.ctx.is_stop_requested() {
            return;
        }

        self.handler.on_poll(&mut self.ctx).await;

        if self.ctx.is_stop_requested() {
            debug!(
                target: "channel_service",
                channel = %self.ctx.channel(),
                "poll not rescheduled after stop"
            );
            return;
        }
        self.schedule_tick(interval);
    }

    fn arm_receive(&mut self) {
        if self.ctx.is_stop_requested() || self.receive.is_some() {
            return;
        }

        let transport = Arc::clone(self.ctx.transport());
        let token = self.ctx.token().clone();
        let channel = self.ctx.channel();
        self.receive = Some(Box::pin(async move {
            token.guard(transport.receive(channel)).await
        }));
    }

    fn schedule_tick(&mut self, interval: Duration) {
        self.ticker = Some(Box::pin(sleep(interval)));
    }

    /// Releases everything the service holds. Safe to call more than once.
    fn halt(&mut self) {
        self.receive = None;
        self.ticker = None;
        self.ctx.detach_local_input();

        if self.halted {
            return;
        }
        self.halted = true;

        let channel = self.ctx.channel();
        self.ctx.token().trigger();
        self.ctx.transport().cancel(channel);
        self.ctx.set_state(ChannelState::Stopping);
        self.handler.on_stop(&mut self.ctx);
        self.ctx.clear_session();
        self.ctx.set_state(ChannelState::Closed);
        info!(target: "channel_service", %channel, "channel service stopped");
    }
}

async fn next_received(slot: &mut Option<ReceiveFuture>) -> Result<InboundMessage, TransportError> {
    match slot.as_mut() {
        Some(receive) => {
            let result = receive.await;
            *slot = None;
            result
        }
        None => pending().await,
    }
}

async fn next_local_input(slot: &mut Option<LocalStream>) -> Option<LocalEvent> {
    match slot.as_mut() {
        Some(events) => events.recv().await,
        None => pending().await,
    }
}

async fn next_tick(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot.as_mut() {
        Some(tick) => {
            tick.await;
            *slot = None;
        }
        None => pending().await,
    }
}
