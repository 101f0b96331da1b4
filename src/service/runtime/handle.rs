use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::shutdown::ShutdownToken;
use crate::transport::{ChannelId, ServiceDescriptor, Transport};

use super::worker::ServiceCommand;

/// Cloneable front door of a channel actor.
#[derive(Clone)]
pub struct ServiceHandle {
    channel: ChannelId,
    command_tx: mpsc::Sender<ServiceCommand>,
    token: ShutdownToken,
    transport: Arc<dyn Transport>,
}

impl ServiceHandle {
    pub(super) fn new(
        channel: ChannelId,
        command_tx: mpsc::Sender<ServiceCommand>,
        token: ShutdownToken,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            channel,
            command_tx,
            token,
            transport,
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel
    }

    pub fn is_stop_requested(&self) -> bool {
        self.token.is_triggered()
    }

    pub async fn start(&self) -> Result<(), ServiceError> {
        self.request(ServiceCommand::Start).await
    }

    pub async fn pause(&self) -> Result<(), ServiceError> {
        self.request(ServiceCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<(), ServiceError> {
        self.request(ServiceCommand::Resume).await
    }

    pub async fn fill_features(&self) -> Result<ServiceDescriptor, ServiceError> {
        self.request(ServiceCommand::FillFeatures).await
    }

    /// Requests a stop and waits for the actor to acknowledge it.
    ///
    /// The token is stored before anything else, then pending transport
    /// operations of the channel are cancelled, so a busy actor sees the
    /// request at its next check even before the command is dequeued.
    pub async fn stop(&self, deadline: Duration) -> Result<(), ServiceError> {
        if self.token.trigger() {
            info!(target: "shutdown", channel = %self.channel, "stop requested");
        }
        self.transport.cancel(self.channel);

        let (ack_tx, ack_rx) = oneshot::channel();
        let acknowledged = timeout(deadline, async {
            if self
                .command_tx
                .send(ServiceCommand::Stop(ack_tx))
                .await
                .is_err()
            {
                debug!(target: "shutdown", channel = %self.channel, "actor already exited");
                return;
            }
            if ack_rx.await.is_err() {
                debug!(target: "shutdown", channel = %self.channel, "actor exited before ack");
            }
        })
        .await;

        match acknowledged {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!(
                    target: "shutdown",
                    channel = %self.channel,
                    ?deadline,
                    "stop not acknowledged in time"
                );
                Err(ServiceError::ShutdownTimeout {
                    channel: self.channel,
                })
            }
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> ServiceCommand,
    ) -> Result<T, ServiceError> {
        let gone = ServiceError::ServiceGone {
            channel: self.channel,
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| gone.clone())?;
        reply_rx.await.map_err(|_| gone)
    }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("channel", &self.channel)
            .field("token", &self.token)
            .finish()
    }
}

/// A service handle together with the task running its actor.
pub struct RunningService {
    handle: ServiceHandle,
    task: Option<JoinHandle<()>>,
}

impl RunningService {
    pub(super) fn new(handle: ServiceHandle, task: JoinHandle<()>) -> Self {
        Self {
            handle,
            task: Some(task),
        }
    }

    pub fn handle(&self) -> &ServiceHandle {
        &self.handle
    }

    pub fn channel_id(&self) -> ChannelId {
        self.handle.channel
    }

    /// Stops the actor and waits for its task to finish. Returns `false` when
    /// either step overran `deadline`; the task is aborted in that case.
    pub async fn stop_and_join(mut self, deadline: Duration) -> bool {
        let acknowledged = self.handle.stop(deadline).await.is_ok();
        let Some(mut task) = self.task.take() else {
            return acknowledged;
        };

        if !acknowledged {
            task.abort();
            return false;
        }

        match timeout(deadline, &mut task).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(target: "shutdown", channel = %self.handle.channel, %err, "actor task failed");
                false
            }
            Err(_) => {
                task.abort();
                false
            }
        }
    }
}

impl Drop for RunningService {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.handle.token.trigger();
            task.abort();
        }
    }
}
