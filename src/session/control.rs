//! Control channel: service discovery, focus negotiation, ping and bye-bye.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::HeadUnitConfig;
use crate::error::{SessionError, TransportError};
use crate::service::ServiceHandle;
use crate::shutdown::ShutdownToken;
use crate::telemetry::events::record_service_discovery;
use crate::transport::{
    AudioFocusRequestType, AudioFocusState, ChannelId, InboundMessage, NavigationFocus,
    OutboundMessage, ServiceDiscoveryResponse, Transport,
};

use super::lifecycle::SessionEvent;

/// Collects one live descriptor per service into a discovery response.
pub async fn build_discovery_response(
    config: &HeadUnitConfig,
    services: &[ServiceHandle],
) -> Result<ServiceDiscoveryResponse, SessionError> {
    let mut channels = Vec::with_capacity(services.len());
    for service in services {
        channels.push(service.fill_features().await?);
    }

    Ok(ServiceDiscoveryResponse {
        display_name: config.display_name.clone(),
        head_unit_info: config.head_unit.clone(),
        channels,
    })
}

pub(crate) struct ControlChannel {
    transport: Arc<dyn Transport>,
    token: ShutdownToken,
    config: Arc<HeadUnitConfig>,
    services: Vec<ServiceHandle>,
    events: broadcast::Sender<SessionEvent>,
}

impl ControlChannel {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        token: ShutdownToken,
        config: Arc<HeadUnitConfig>,
        services: Vec<ServiceHandle>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            transport,
            token,
            config,
            services,
            events,
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        info!(target: "control_channel", "control channel started");
        while !self.token.is_triggered() {
            let received = self
                .token
                .guard(self.transport.receive(ChannelId::Control))
                .await;

            let keep_running = match received {
                Ok(message) => self.handle(message).await,
                Err(err) => {
                    self.on_error(&err);
                    false
                }
            };
            if !keep_running {
                break;
            }
        }
        info!(target: "control_channel", "control channel finished");
    }

    /// Returns `false` once the channel should stop receiving.
    async fn handle(&self, message: InboundMessage) -> bool {
        match message {
            InboundMessage::ServiceDiscoveryRequest { device_name, label } => {
                info!(target: "control_channel", %device_name, %label, "service discovery request");
                let response = match build_discovery_response(&self.config, &self.services).await
                {
                    Ok(response) => response,
                    Err(err) => {
                        error!(target: "control_channel", %err, "service discovery failed");
                        self.publish(SessionEvent::ControlChannelFailed {
                            reason: err.to_string(),
                        });
                        return false;
                    }
                };
                record_service_discovery(&response);
                self.send(OutboundMessage::ServiceDiscoveryResponse(response))
                    .await
            }
            InboundMessage::AudioFocusRequest { request } => {
                let state = match request {
                    AudioFocusRequestType::Release => AudioFocusState::Loss,
                    _ => AudioFocusState::Gain,
                };
                info!(target: "control_channel", ?request, ?state, "audio focus request");
                self.send(OutboundMessage::AudioFocusNotification { state })
                    .await
            }
            InboundMessage::NavigationFocusRequest { focus_type } => {
                info!(target: "control_channel", focus_type, "navigation focus request");
                self.send(OutboundMessage::NavigationFocusNotification {
                    focus: NavigationFocus::Projected,
                })
                .await
            }
            InboundMessage::PingRequest { timestamp } => {
                debug!(target: "control_channel", timestamp, "ping request");
                true
            }
            InboundMessage::ByeByeRequest { reason } => {
                info!(target: "control_channel", reason, "bye-bye request");
                self.send(OutboundMessage::ByeByeResponse).await;
                self.publish(SessionEvent::ByeByeRequested { reason });
                false
            }
            InboundMessage::ByeByeResponse => {
                info!(target: "control_channel", "bye-bye response");
                self.publish(SessionEvent::ByeByeAcknowledged);
                false
            }
            other => {
                warn!(
                    target: "control_channel",
                    kind = other.kind(),
                    "unexpected message on control channel"
                );
                true
            }
        }
    }

    async fn send(&self, message: OutboundMessage) -> bool {
        match self
            .token
            .guard(self.transport.send(ChannelId::Control, message))
            .await
        {
            Ok(()) => true,
            Err(err) => {
                self.on_error(&err);
                false
            }
        }
    }

    fn on_error(&self, err: &TransportError) {
        if err.is_operation_aborted() && self.token.is_triggered() {
            debug!(target: "control_channel", "control operation aborted during shutdown");
            return;
        }
        error!(target: "control_channel", %err, "control channel error");
        self.publish(SessionEvent::ControlChannelFailed {
            reason: err.to_string(),
        });
    }

    fn publish(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
