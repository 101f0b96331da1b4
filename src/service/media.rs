//! Session binding and payload path shared by the audio and video sinks.

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::device::MediaOutput;
use crate::error::ProtocolViolation;
use crate::transport::{MediaSetupStatus, OutboundMessage, SessionId, Timestamp};

use super::constants::{MEDIA_ACK_COUNT, MEDIA_CONFIGURATION_INDEX, MEDIA_MAX_UNACKED};
use super::runtime::{ChannelContext, ChannelState};

/// Answers a setup request and leaves the channel in SETUP. `Wait` sends it
/// back to OPEN so the peer retries; after `Ready` the caller moves it to
/// READY once its post-setup notifications went out. Returns whether the
/// response was sent.
pub(crate) async fn answer_setup(ctx: &mut ChannelContext, status: MediaSetupStatus) -> bool {
    let state = ctx.state();
    if !matches!(
        state,
        ChannelState::Open | ChannelState::Setup | ChannelState::Ready
    ) {
        warn!(
            target: "media_sink",
            channel = %ctx.channel(),
            %state,
            "setup request ignored"
        );
        return false;
    }

    ctx.set_state(ChannelState::Setup);
    info!(
        target: "media_sink",
        channel = %ctx.channel(),
        ?status,
        "media setup answered"
    );

    let sent = ctx
        .send(OutboundMessage::MediaSetupResponse {
            status,
            max_unacked: MEDIA_MAX_UNACKED,
            configuration_indices: vec![MEDIA_CONFIGURATION_INDEX],
        })
        .await;
    if status == MediaSetupStatus::Wait {
        ctx.set_state(ChannelState::Open);
    }
    sent
}

/// Binds the peer's session. Only a READY channel starts the device; a
/// paused channel records the session and starts it on resume.
pub(crate) fn start_indication<O>(
    ctx: &mut ChannelContext,
    output: &O,
    session_id: SessionId,
    configuration_index: u32,
) where
    O: MediaOutput + ?Sized,
{
    match ctx.state() {
        ChannelState::Ready => {
            info!(
                target: "media_sink",
                channel = %ctx.channel(),
                %session_id,
                configuration_index,
                "media start indication"
            );
            ctx.bind_session(session_id);
            ctx.set_state(ChannelState::Active);
            output.start();
        }
        ChannelState::Paused => {
            info!(
                target: "media_sink",
                channel = %ctx.channel(),
                %session_id,
                "media session bound while paused"
            );
            ctx.bind_session(session_id);
        }
        state => {
            let violation = ProtocolViolation::UnexpectedStartIndication {
                channel: ctx.channel(),
                state,
            };
            warn!(target: "media_sink", channel = %ctx.channel(), %violation, "start indication rejected");
        }
    }
}

pub(crate) fn stop_indication<O>(ctx: &mut ChannelContext, output: &O)
where
    O: MediaOutput + ?Sized,
{
    match ctx.state() {
        ChannelState::Active => {
            let previous = ctx.clear_session();
            info!(
                target: "media_sink",
                channel = %ctx.channel(),
                session_id = ?previous,
                "media stop indication"
            );
            ctx.set_state(ChannelState::Ready);
            output.suspend();
        }
        // Already suspended by the local pause.
        ChannelState::Paused => {
            let previous = ctx.clear_session();
            info!(
                target: "media_sink",
                channel = %ctx.channel(),
                session_id = ?previous,
                "media stop indication while paused"
            );
        }
        state => debug!(
            target: "media_sink",
            channel = %ctx.channel(),
            %state,
            "stop indication without a running session"
        ),
    }
}

/// Restarts the device if a session is bound, else falls back to READY.
pub(crate) fn resume<O>(ctx: &mut ChannelContext, output: &O)
where
    O: MediaOutput + ?Sized,
{
    if ctx.session().is_some() {
        output.start();
    } else {
        ctx.set_state(ChannelState::Ready);
    }
}

/// Writes one payload and acknowledges it with the active session id. The
/// write is awaited before the ack so a slow device holds back the peer.
/// While paused the payload is acknowledged but dropped.
pub(crate) async fn media_data<O>(
    ctx: &mut ChannelContext,
    output: &O,
    timestamp: Option<Timestamp>,
    payload: Bytes,
) where
    O: MediaOutput + ?Sized,
{
    let Some(session_id) = ctx.session() else {
        let violation = ProtocolViolation::WriteWithoutSession {
            channel: ctx.channel(),
        };
        warn!(
            target: "media_sink",
            channel = %ctx.channel(),
            bytes = payload.len(),
            %violation,
            "media payload rejected"
        );
        return;
    };

    if ctx.state() == ChannelState::Paused {
        debug!(
            target: "media_sink",
            channel = %ctx.channel(),
            bytes = payload.len(),
            "media payload dropped while paused"
        );
    } else {
        output.write(timestamp, payload).await;
        debug!(target: "media_sink", channel = %ctx.channel(), %session_id, "media payload written");
    }

    ctx.send(OutboundMessage::MediaAck {
        session_id,
        ack: MEDIA_ACK_COUNT,
    })
    .await;
}
