use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::device::AudioInput;
use crate::transport::{
    AudioConfig, ChannelId, InboundMessage, MediaCodec, MediaSetupStatus, MediaSourceDescriptor,
    MessageStatus, OutboundMessage, ServiceDescriptor, ServiceKind,
};

use super::input::timestamp_us;
use super::media;
use super::runtime::{ChannelContext, ChannelHandler, ChannelState, LocalEvent};

/// PCM capture channel. The peer opens and closes the microphone; captured
/// frames flow back while the channel is active.
pub struct MicrophoneSource {
    input: Arc<dyn AudioInput>,
    capturing: bool,
}

impl MicrophoneSource {
    pub fn new(input: Arc<dyn AudioInput>) -> Self {
        Self {
            input,
            capturing: false,
        }
    }

    async fn open_microphone(&mut self, ctx: &mut ChannelContext) {
        match ctx.state() {
            ChannelState::Ready => {}
            ChannelState::Active | ChannelState::Paused => {
                debug!(target: "media_source", "microphone already open");
                ctx.send(OutboundMessage::MicrophoneResponse {
                    status: MessageStatus::Success,
                })
                .await;
                return;
            }
            state => {
                warn!(target: "media_source", %state, "microphone request before setup");
                ctx.send(OutboundMessage::MicrophoneResponse {
                    status: MessageStatus::UnsolicitedMessage,
                })
                .await;
                return;
            }
        }

        let Some(chunks) = self.input.start() else {
            warn!(target: "media_source", "microphone capture could not start");
            ctx.send(OutboundMessage::MicrophoneResponse {
                status: MessageStatus::InternalError,
            })
            .await;
            return;
        };

        self.capturing = true;
        ctx.attach_capture(chunks);
        ctx.set_state(ChannelState::Active);
        info!(target: "media_source", "microphone opened");
        ctx.send(OutboundMessage::MicrophoneResponse {
            status: MessageStatus::Success,
        })
        .await;
    }

    async fn close_microphone(&mut self, ctx: &mut ChannelContext) {
        if self.stop_capture(ctx) {
            ctx.set_state(ChannelState::Ready);
            info!(target: "media_source", "microphone closed");
        }
        ctx.send(OutboundMessage::MicrophoneResponse {
            status: MessageStatus::Success,
        })
        .await;
    }

    fn stop_capture(&mut self, ctx: &mut ChannelContext) -> bool {
        if !self.capturing {
            return false;
        }
        ctx.detach_local_input();
        self.input.stop();
        self.capturing = false;
        true
    }

    async fn forward(&mut self, ctx: &mut ChannelContext, chunk: Bytes) {
        match ctx.state() {
            ChannelState::Active => {
                ctx.send(OutboundMessage::MediaSourceData {
                    timestamp_us: timestamp_us(),
                    payload: chunk,
                })
                .await;
            }
            state => debug!(
                target: "media_source",
                %state,
                bytes = chunk.len(),
                "captured chunk dropped"
            ),
        }
    }
}

#[async_trait]
impl ChannelHandler for MicrophoneSource {
    fn channel_id(&self) -> ChannelId {
        ChannelId::MediaSourceMicrophone
    }

    fn fill_features(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            channel_id: ChannelId::MediaSourceMicrophone,
            kind: ServiceKind::MediaSource(MediaSourceDescriptor {
                codec: MediaCodec::AudioPcm,
                audio_config: AudioConfig {
                    sampling_rate: self.input.sample_rate(),
                    number_of_bits: self.input.sample_size(),
                    number_of_channels: self.input.channel_count(),
                },
            }),
        }
    }

    fn open_device(&mut self) -> bool {
        self.input.open()
    }

    async fn on_message(&mut self, ctx: &mut ChannelContext, message: InboundMessage) {
        match message {
            InboundMessage::MediaSetupRequest { .. } => {
                if media::answer_setup(ctx, MediaSetupStatus::Ready).await {
                    ctx.set_state(ChannelState::Ready);
                }
            }
            InboundMessage::MicrophoneRequest {
                open,
                anc_enabled,
                ec_enabled,
                max_unacked,
            } => {
                info!(
                    target: "media_source",
                    open,
                    anc_enabled,
                    ec_enabled,
                    max_unacked,
                    "microphone request"
                );
                if open {
                    self.open_microphone(ctx).await;
                } else {
                    self.close_microphone(ctx).await;
                }
            }
            InboundMessage::MediaAckIndication { session_id, ack } => {
                debug!(target: "media_source", %session_id, ack, "capture acknowledged");
            }
            other => warn!(
                target: "media_source",
                kind = other.kind(),
                "unexpected message on microphone channel"
            ),
        }
    }

    async fn on_local_event(&mut self, ctx: &mut ChannelContext, event: LocalEvent) {
        if let LocalEvent::Capture(chunk) = event {
            self.forward(ctx, chunk).await;
        }
    }

    fn on_stop(&mut self, ctx: &mut ChannelContext) {
        self.stop_capture(ctx);
    }
}
