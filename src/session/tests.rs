use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::config::HeadUnitConfig;
use crate::device::{KeyCode, Size};
use crate::error::SessionError;
use crate::test_support::{
    DeviceCall, MockAudioInput, MockAudioOutput, MockInputDevice, MockSensorProvider,
    MockVideoOutput,
};
use crate::transport::{
    AudioFocusRequestType, AudioFocusState, ChannelId, InboundMessage, LoopbackTransport,
    MessageStatus, NavigationFocus, OutboundMessage, PeerEndpoint, VideoFocusMode,
    VideoFocusReason,
};

use super::*;

struct Fixture {
    orchestrator: SessionOrchestrator,
    peer: PeerEndpoint,
    system_audio: Arc<MockAudioOutput>,
}

fn devices() -> (DeviceSet, Arc<MockAudioOutput>) {
    let system_audio = MockAudioOutput::new(16_000, 16, 1);
    let devices = DeviceSet::new(
        system_audio.clone(),
        MockVideoOutput::new(),
        MockInputDevice::new(vec![KeyCode::Back], Some(Size::new(800, 480))),
        MockSensorProvider::new(),
    );
    (devices, system_audio)
}

fn fixture(config: HeadUnitConfig) -> Fixture {
    let (transport, peer) = LoopbackTransport::new();
    let (devices, system_audio) = devices();
    let devices = devices.with_media_audio(MockAudioOutput::new(48_000, 16, 2));
    let orchestrator = SessionOrchestrator::new(Arc::new(config), transport, devices)
        .expect("orchestrator builds");
    Fixture {
        orchestrator,
        peer,
        system_audio,
    }
}

async fn next_control(peer: &mut PeerEndpoint) -> OutboundMessage {
    loop {
        let (channel, message) = timeout(Duration::from_secs(1), peer.next_sent())
            .await
            .expect("message in time")
            .expect("transport open");
        if channel == ChannelId::Control {
            return message;
        }
    }
}

#[tokio::test]
async fn factory_builds_configured_channels() {
    let mut config = HeadUnitConfig::default();
    config.audio.media_enabled = true;
    let fixture = fixture(config);

    assert_eq!(
        fixture.orchestrator.channels(),
        vec![
            ChannelId::MediaSinkSystemAudio,
            ChannelId::MediaSinkMediaAudio,
            ChannelId::MediaSinkVideo,
            ChannelId::SensorSource,
            ChannelId::InputSource,
        ]
    );
}

#[tokio::test]
async fn disabled_stream_is_skipped_even_with_a_device() {
    let fixture = fixture(HeadUnitConfig::default());
    assert!(!fixture
        .orchestrator
        .channels()
        .contains(&ChannelId::MediaSinkMediaAudio));
}

#[tokio::test]
async fn enabled_stream_without_device_is_rejected() {
    let mut config = HeadUnitConfig::default();
    config.audio.telephony_enabled = true;
    let (transport, _peer) = LoopbackTransport::new();
    let (devices, _) = devices();

    let result = SessionOrchestrator::new(Arc::new(config), transport, devices);
    assert!(matches!(
        result,
        Err(SessionError::MissingDevice {
            channel: ChannelId::MediaSinkTelephonyAudio
        })
    ));
}

#[tokio::test]
async fn microphone_channel_is_opt_in() {
    let mut config = HeadUnitConfig::default();
    config.audio.microphone_enabled = true;
    let (transport, _peer) = LoopbackTransport::new();
    let (devices, _) = devices();
    let orchestrator = SessionOrchestrator::new(
        Arc::new(config.clone()),
        transport,
        devices.with_microphone(MockAudioInput::new()),
    )
    .expect("orchestrator builds");
    assert_eq!(
        orchestrator.channels(),
        vec![
            ChannelId::MediaSinkSystemAudio,
            ChannelId::MediaSinkVideo,
            ChannelId::MediaSourceMicrophone,
            ChannelId::SensorSource,
            ChannelId::InputSource,
        ]
    );

    let (transport, _peer) = LoopbackTransport::new();
    let (devices, _) = self::devices();
    let result = SessionOrchestrator::new(Arc::new(config), transport, devices);
    assert!(matches!(
        result,
        Err(SessionError::MissingDevice {
            channel: ChannelId::MediaSourceMicrophone
        })
    ));
}

#[tokio::test]
async fn lifecycle_rejects_out_of_order_calls() {
    let mut fixture = fixture(HeadUnitConfig::default());
    let orchestrator = &mut fixture.orchestrator;

    assert!(matches!(
        orchestrator.discover().await,
        Err(SessionError::NotRunning)
    ));
    orchestrator.start().await.expect("start");
    assert_eq!(orchestrator.phase(), SessionPhase::Running);
    assert!(matches!(
        orchestrator.start().await,
        Err(SessionError::AlreadyStarted)
    ));

    let report = orchestrator.shutdown().await.expect("shutdown");
    assert!(report.is_clean());
    assert_eq!(orchestrator.phase(), SessionPhase::Stopped);
    assert!(matches!(
        orchestrator.shutdown().await,
        Err(SessionError::AlreadyStopped)
    ));
    assert!(matches!(
        orchestrator.start().await,
        Err(SessionError::AlreadyStopped)
    ));
}

#[tokio::test]
async fn discovery_request_is_answered_with_every_channel() {
    let mut config = HeadUnitConfig::default();
    config.display_name = "Dash".to_string();
    config.audio.media_enabled = true;
    let mut fixture = fixture(config);
    fixture.orchestrator.start().await.expect("start");

    fixture.peer.deliver(
        ChannelId::Control,
        InboundMessage::ServiceDiscoveryRequest {
            device_name: "Pixel".to_string(),
            label: "phone".to_string(),
        },
    );

    let OutboundMessage::ServiceDiscoveryResponse(response) =
        next_control(&mut fixture.peer).await
    else {
        panic!("expected a discovery response");
    };
    assert_eq!(response.display_name, "Dash");
    assert_eq!(response.head_unit_info.make, "Generic");
    let channels: Vec<_> = response
        .channels
        .iter()
        .map(|descriptor| descriptor.channel_id)
        .collect();
    assert_eq!(channels, fixture.orchestrator.channels());
    assert!(response.descriptor(ChannelId::SensorSource).is_some());

    let direct = fixture.orchestrator.discover().await.expect("discover");
    assert_eq!(direct, response);
    fixture.orchestrator.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn focus_requests_are_granted() {
    let mut fixture = fixture(HeadUnitConfig::default());
    fixture.orchestrator.start().await.expect("start");

    fixture.peer.deliver(
        ChannelId::Control,
        InboundMessage::AudioFocusRequest {
            request: AudioFocusRequestType::GainTransient,
        },
    );
    fixture.peer.deliver(
        ChannelId::Control,
        InboundMessage::AudioFocusRequest {
            request: AudioFocusRequestType::Release,
        },
    );
    fixture.peer.deliver(
        ChannelId::Control,
        InboundMessage::NavigationFocusRequest { focus_type: 1 },
    );

    assert_eq!(
        next_control(&mut fixture.peer).await,
        OutboundMessage::AudioFocusNotification {
            state: AudioFocusState::Gain
        }
    );
    assert_eq!(
        next_control(&mut fixture.peer).await,
        OutboundMessage::AudioFocusNotification {
            state: AudioFocusState::Loss
        }
    );
    assert_eq!(
        next_control(&mut fixture.peer).await,
        OutboundMessage::NavigationFocusNotification {
            focus: NavigationFocus::Projected
        }
    );
    fixture.orchestrator.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn bye_bye_request_ends_the_session_cleanly() {
    let mut fixture = fixture(HeadUnitConfig::default());
    fixture.orchestrator.start().await.expect("start");

    fixture
        .peer
        .deliver(ChannelId::Control, InboundMessage::ByeByeRequest { reason: 1 });

    let summary = timeout(Duration::from_secs(5), fixture.orchestrator.run_until_end())
        .await
        .expect("session ends in time")
        .expect("session ends");
    assert_eq!(summary.reason, SessionEndReason::ByeByeRequested { reason: 1 });
    assert!(summary.report.is_clean());
    assert_eq!(summary.report.acknowledged.len(), 4);
    assert_eq!(
        next_control(&mut fixture.peer).await,
        OutboundMessage::ByeByeResponse
    );
    assert_eq!(fixture.orchestrator.phase(), SessionPhase::Stopped);
    assert_eq!(
        fixture.system_audio.calls().last(),
        Some(&DeviceCall::Stop)
    );
}

#[tokio::test]
async fn native_video_focus_ends_the_session() {
    let mut fixture = fixture(HeadUnitConfig::default());
    fixture.orchestrator.start().await.expect("start");

    fixture.peer.deliver(
        ChannelId::MediaSinkVideo,
        InboundMessage::ChannelOpenRequest { priority: 0 },
    );
    fixture.peer.deliver(
        ChannelId::MediaSinkVideo,
        InboundMessage::VideoFocusRequest {
            mode: VideoFocusMode::Native,
            reason: VideoFocusReason::LaunchNative,
        },
    );

    let summary = timeout(Duration::from_secs(5), fixture.orchestrator.run_until_end())
        .await
        .expect("session ends in time")
        .expect("session ends");
    assert_eq!(summary.reason, SessionEndReason::ProjectionReleased);

    let sent = fixture.peer.drain_sent();
    assert!(sent.contains(&(
        ChannelId::MediaSinkVideo,
        OutboundMessage::ChannelOpenResponse {
            status: MessageStatus::Success
        }
    )));
}

#[tokio::test]
async fn control_channel_loss_ends_the_session() {
    let mut fixture = fixture(HeadUnitConfig::default());
    fixture.orchestrator.start().await.expect("start");

    fixture.peer.hang_up(ChannelId::Control);
    let summary = timeout(Duration::from_secs(5), fixture.orchestrator.run_until_end())
        .await
        .expect("session ends in time")
        .expect("session ends");
    assert!(matches!(
        summary.reason,
        SessionEndReason::ControlChannelFailed { .. }
    ));
}

#[tokio::test]
async fn phase_changes_are_broadcast() {
    let mut fixture = fixture(HeadUnitConfig::default());
    let mut events = fixture.orchestrator.subscribe_events();

    fixture.orchestrator.start().await.expect("start");
    fixture.orchestrator.pause().await.expect("pause");
    fixture.orchestrator.resume().await.expect("resume");
    fixture.orchestrator.shutdown().await.expect("shutdown");

    let mut phases = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::PhaseChanged(update) = event {
            phases.push(update.phase);
        }
    }
    assert_eq!(
        phases,
        vec![
            SessionPhase::Running,
            SessionPhase::Stopping,
            SessionPhase::Stopped
        ]
    );
}
