use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::device::VideoOutput;
use crate::session::SessionEvent;
use crate::transport::{
    ChannelId, InboundMessage, MediaCodec, MediaSetupStatus, MediaSinkDescriptor, OutboundMessage,
    ServiceDescriptor, ServiceKind, VideoConfig, VideoFocusMode, VideoFocusReason,
};

use super::media;
use super::runtime::{ChannelContext, ChannelHandler, ChannelState};

/// H.264 sink for the projected display. Also arbitrates display focus.
pub struct VideoSink {
    output: Arc<dyn VideoOutput>,
}

impl VideoSink {
    pub fn new(output: Arc<dyn VideoOutput>) -> Self {
        Self { output }
    }

    async fn setup(&mut self, ctx: &mut ChannelContext) {
        let status = if self.output.init() {
            MediaSetupStatus::Ready
        } else {
            warn!(target: "media_sink", channel = %ctx.channel(), "video decoder not ready");
            MediaSetupStatus::Wait
        };

        let sent = media::answer_setup(ctx, status).await;
        if sent && status == MediaSetupStatus::Ready && send_focus_indication(ctx).await {
            ctx.set_state(ChannelState::Ready);
        }
    }

    async fn focus_request(
        &mut self,
        ctx: &mut ChannelContext,
        mode: VideoFocusMode,
        reason: VideoFocusReason,
    ) {
        info!(
            target: "media_sink",
            channel = %ctx.channel(),
            ?mode,
            ?reason,
            "video focus request"
        );

        if mode == VideoFocusMode::Native {
            info!(target: "media_sink", channel = %ctx.channel(), "projection released to native UI");
            ctx.publish(SessionEvent::ProjectionReleased {
                channel: ctx.channel(),
            });
        }

        send_focus_indication(ctx).await;
    }
}

/// The head unit keeps the projected surface; a native request is surfaced
/// through [`SessionEvent::ProjectionReleased`] instead of a focus change.
async fn send_focus_indication(ctx: &mut ChannelContext) -> bool {
    ctx.send(OutboundMessage::VideoFocusIndication {
        focus: VideoFocusMode::Projected,
        unsolicited: false,
    })
    .await
}

#[async_trait]
impl ChannelHandler for VideoSink {
    fn channel_id(&self) -> ChannelId {
        ChannelId::MediaSinkVideo
    }

    fn fill_features(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            channel_id: ChannelId::MediaSinkVideo,
            kind: ServiceKind::MediaSink(MediaSinkDescriptor {
                codec: MediaCodec::VideoH264Bp,
                audio_type: None,
                available_while_in_call: true,
                audio_configs: Vec::new(),
                video_configs: vec![VideoConfig::new(
                    self.output.resolution(),
                    self.output.frame_rate(),
                    self.output.margins(),
                    self.output.dpi(),
                )],
            }),
        }
    }

    fn open_device(&mut self) -> bool {
        self.output.open()
    }

    async fn on_message(&mut self, ctx: &mut ChannelContext, message: InboundMessage) {
        match message {
            InboundMessage::MediaSetupRequest { .. } => self.setup(ctx).await,
            InboundMessage::MediaStartIndication {
                session_id,
                configuration_index,
            } => media::start_indication(ctx, &*self.output, session_id, configuration_index),
            InboundMessage::MediaStopIndication => media::stop_indication(ctx, &*self.output),
            InboundMessage::MediaData { timestamp, payload } => {
                media::media_data(ctx, &*self.output, timestamp, payload).await;
            }
            InboundMessage::VideoFocusRequest { mode, reason } => {
                self.focus_request(ctx, mode, reason).await;
            }
            other => warn!(
                target: "media_sink",
                channel = %ctx.channel(),
                kind = other.kind(),
                "unexpected message on video channel"
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
