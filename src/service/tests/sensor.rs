use std::time::Duration;

use tokio::time::sleep;

use crate::error::TransportError;
use crate::service::sensor::encode_location;
use crate::service::SensorSource;
use crate::test_support::{sample_fix, MockSensorProvider};
use crate::transport::{
    ChannelId, DrivingStatus, InboundMessage, MessageStatus, OutboundMessage, SensorBatch,
    SensorSourceDescriptor, SensorType, ServiceKind,
};

use super::started;

const POLL: Duration = Duration::from_millis(250);

fn start_response() -> OutboundMessage {
    OutboundMessage::SensorStartResponse {
        status: MessageStatus::Success,
    }
}

#[tokio::test(start_paused = true)]
async fn driving_status_is_reported_unrestricted() {
    let provider = MockSensorProvider::new();
    let mut harness = started(SensorSource::new(provider.clone(), POLL)).await;
    harness.open().await;

    harness.deliver(InboundMessage::SensorStartRequest {
        sensor: SensorType::DrivingStatus,
    });
    assert_eq!(harness.next_sent().await, start_response());
    assert_eq!(
        harness.next_sent().await,
        OutboundMessage::SensorEvent(SensorBatch::DrivingStatus(DrivingStatus::Unrestricted))
    );
    assert_eq!(provider.connects(), 1);

    harness.stop().await;
    assert_eq!(provider.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn night_mode_is_pushed_only_on_change() {
    let provider = MockSensorProvider::new();
    let mut harness = started(SensorSource::new(provider.clone(), POLL)).await;
    harness.open().await;

    sleep(POLL * 3).await;
    assert_eq!(provider.night_polls(), 0, "no night samples before the peer asks");

    harness.deliver(InboundMessage::SensorStartRequest {
        sensor: SensorType::NightMode,
    });
    assert_eq!(harness.next_sent().await, start_response());
    assert_eq!(
        harness.next_sent().await,
        OutboundMessage::SensorEvent(SensorBatch::NightMode { night: false })
    );

    sleep(POLL * 3).await;
    assert!(harness.peer.try_next_sent().is_none());

    provider.set_night(true);
    assert_eq!(
        harness.next_sent().await,
        OutboundMessage::SensorEvent(SensorBatch::NightMode { night: true })
    );
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn location_fix_is_polled_and_encoded() {
    let provider = MockSensorProvider::new();
    provider.set_fix(Some(sample_fix()));
    let mut harness = started(SensorSource::new(provider.clone(), POLL)).await;
    harness.open().await;

    harness.deliver(InboundMessage::SensorStartRequest {
        sensor: SensorType::Location,
    });
    assert_eq!(harness.next_sent().await, start_response());

    let expected = encode_location(&sample_fix()).expect("fix encodes");
    assert_eq!(
        harness.next_sent().await,
        OutboundMessage::SensorEvent(SensorBatch::Location(expected))
    );
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_during_delayed_poll_never_reschedules() {
    let provider = MockSensorProvider::new();
    provider.set_fix(Some(sample_fix()));
    provider.set_location_delay(Duration::from_secs(1));
    let mut harness = started(SensorSource::new(provider.clone(), POLL)).await;
    harness.open().await;

    harness.deliver(InboundMessage::SensorStartRequest {
        sensor: SensorType::Location,
    });
    assert_eq!(harness.next_sent().await, start_response());

    // First tick is now parked inside the provider.
    sleep(POLL + Duration::from_millis(50)).await;
    assert_eq!(provider.location_polls(), 1);

    harness.stop().await;
    assert_eq!(provider.location_polls(), 1);

    sleep(POLL * 20).await;
    assert_eq!(provider.location_polls(), 1, "no tick after stop");
    assert_eq!(provider.disconnects(), 1);
    assert!(harness.peer.try_next_sent().is_none());
}

#[tokio::test(start_paused = true)]
async fn unexpected_send_failure_stops_the_channel() {
    let provider = MockSensorProvider::new();
    provider.set_fix(Some(sample_fix()));
    let mut harness = started(SensorSource::new(provider.clone(), POLL)).await;
    harness.open().await;

    harness.deliver(InboundMessage::SensorStartRequest {
        sensor: SensorType::Location,
    });
    assert_eq!(harness.next_sent().await, start_response());

    harness.transport.fail_sends(
        ChannelId::SensorSource,
        TransportError::send_failed("usb stall"),
    );
    sleep(POLL + Duration::from_millis(10)).await;
    assert_eq!(provider.location_polls(), 1);
    assert!(harness.service.handle().is_stop_requested());
    assert_eq!(provider.disconnects(), 1);

    sleep(POLL * 10).await;
    assert_eq!(provider.location_polls(), 1);

    // The actor is still around to acknowledge the orchestrator's stop.
    harness.stop().await;
    assert_eq!(provider.disconnects(), 1);
}

#[tokio::test]
async fn features_list_every_sensor() {
    let provider = MockSensorProvider::new();
    let harness = started(SensorSource::new(provider, POLL)).await;
    let descriptor = harness
        .service
        .handle()
        .fill_features()
        .await
        .expect("features");
    assert_eq!(descriptor.channel_id, ChannelId::SensorSource);
    assert_eq!(
        descriptor.kind,
        ServiceKind::SensorSource(SensorSourceDescriptor {
            sensors: vec![
                SensorType::DrivingStatus,
                SensorType::Location,
                SensorType::NightMode
            ],
        })
    );
    harness.stop().await;
}
