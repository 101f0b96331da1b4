use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::device::AudioOutput;
use crate::transport::{
    AudioConfig, ChannelId, InboundMessage, MediaCodec, MediaSetupStatus, MediaSinkDescriptor,
    ServiceDescriptor, ServiceKind,
};

use super::media;
use super::runtime::{ChannelContext, ChannelHandler, ChannelState};

/// PCM sink for one audio stream. Every stream type runs its own instance on
/// its own channel.
pub struct AudioSink {
    channel: ChannelId,
    output: Arc<dyn AudioOutput>,
}

impl AudioSink {
    pub fn new(channel: ChannelId, output: Arc<dyn AudioOutput>) -> Self {
        Self { channel, output }
    }
}

#[async_trait]
impl ChannelHandler for AudioSink {
    fn channel_id(&self) -> ChannelId {
        self.channel
    }

    fn fill_features(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            channel_id: self.channel,
            kind: ServiceKind::MediaSink(MediaSinkDescriptor {
                codec: MediaCodec::AudioPcm,
                audio_type: self.channel.audio_stream_type(),
                available_while_in_call: true,
                audio_configs: vec![AudioConfig {
                    sampling_rate: self.output.sample_rate(),
                    number_of_bits: self.output.sample_size(),
                    number_of_channels: self.output.channel_count(),
                }],
                video_configs: Vec::new(),
            }),
        }
    }

    fn open_device(&mut self) -> bool {
        self.output.open()
    }

    async fn on_message(&mut self, ctx: &mut ChannelContext, message: InboundMessage) {
        match message {
            InboundMessage::MediaSetupRequest { .. } => {
                if media::answer_setup(ctx, MediaSetupStatus::Ready).await {
                    ctx.set_state(ChannelState::Ready);
                }
            }
            InboundMessage::MediaStartIndication {
                session_id,
                configuration_index,
            } => media::start_indication(ctx, &*self.output, session_id, configuration_index),
            InboundMessage::MediaStopIndication => media::stop_indication(ctx, &*self.output),
            InboundMessage::MediaData { timestamp, payload } => {
                media::media_data(ctx, &*self.output, timestamp, payload).await;
            }
            other => warn!(
                target: "media_sink",
                channel = %self.channel,
                kind = other.kind(),
                "unexpected message on audio channel"
            ),
        }
    }

    fn on_pause(&mut self, _ctx: &mut ChannelContext) {
        self.output.suspend();
    }

    fn on_resume(&mut self, ctx: &mut ChannelContext) {
        media::resume(ctx, &*self.output);
    }

    fn on_stop(&mut self, _ctx: &mut ChannelContext) {
        self.output.stop();
    }
}
