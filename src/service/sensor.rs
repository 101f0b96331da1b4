use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::device::{FixMode, GpsFix, SensorProvider};
use crate::transport::{
    ChannelId, DrivingStatus, InboundMessage, LocationData, MessageStatus, OutboundMessage,
    SensorBatch, SensorSourceDescriptor, SensorType, ServiceDescriptor, ServiceKind,
};

use super::constants::{
    KNOTS_PER_METER_PER_SECOND, LOCATION_ACCURACY_SCALE, LOCATION_ALTITUDE_SCALE,
    LOCATION_BEARING_SCALE, LOCATION_DEGREES_SCALE, LOCATION_SPEED_SCALE,
};
use super::runtime::{ChannelContext, ChannelHandler, DriveMode};

const ADVERTISED_SENSORS: [SensorType; 3] = [
    SensorType::DrivingStatus,
    SensorType::Location,
    SensorType::NightMode,
];

/// Poll-driven source for driving status, day/night and location.
pub struct SensorSource {
    provider: Arc<dyn SensorProvider>,
    poll_interval: Duration,
    location_connected: bool,
    night_mode_reporting: bool,
    location_reporting: bool,
    last_night_mode: Option<bool>,
}

impl SensorSource {
    pub fn new(provider: Arc<dyn SensorProvider>, poll_interval: Duration) -> Self {
        Self {
            provider,
            poll_interval,
            location_connected: false,
            night_mode_reporting: false,
            location_reporting: false,
            last_night_mode: None,
        }
    }

    async fn start_request(&mut self, ctx: &mut ChannelContext, sensor: SensorType) {
        info!(target: "sensor_source", ?sensor, "sensor start request");

        let sent = ctx
            .send(OutboundMessage::SensorStartResponse {
                status: MessageStatus::Success,
            })
            .await;
        if !sent {
            return;
        }

        match sensor {
            SensorType::DrivingStatus => {
                ctx.send(OutboundMessage::SensorEvent(SensorBatch::DrivingStatus(
                    DrivingStatus::Unrestricted,
                )))
                .await;
            }
            SensorType::NightMode => {
                self.night_mode_reporting = true;
                let night = self.provider.night_mode().await;
                self.send_night_mode(ctx, night).await;
            }
            SensorType::Location => {
                self.location_reporting = true;
            }
        }
    }

    async fn send_night_mode(&mut self, ctx: &mut ChannelContext, night: bool) -> bool {
        debug!(target: "sensor_source", night, "night mode sample");
        let sent = ctx
            .send(OutboundMessage::SensorEvent(SensorBatch::NightMode { night }))
            .await;
        if sent {
            self.last_night_mode = Some(night);
        }
        sent
    }
}

#[async_trait]
impl ChannelHandler for SensorSource {
    fn channel_id(&self) -> ChannelId {
        ChannelId::SensorSource
    }

    fn drive_mode(&self) -> DriveMode {
        DriveMode::PollDriven(self.poll_interval)
    }

    fn fill_features(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            channel_id: ChannelId::SensorSource,
            kind: ServiceKind::SensorSource(SensorSourceDescriptor {
                sensors: ADVERTISED_SENSORS.to_vec(),
            }),
        }
    }

    async fn on_start(&mut self, _ctx: &mut ChannelContext) {
        self.location_connected = self.provider.connect();
        if !self.location_connected {
            warn!(target: "sensor_source", "location provider unavailable");
        }
    }

    async fn on_message(&mut self, ctx: &mut ChannelContext, message: InboundMessage) {
        match message {
            InboundMessage::SensorStartRequest { sensor } => self.start_request(ctx, sensor).await,
            other => warn!(
                target: "sensor_source",
                kind = other.kind(),
                "unexpected message on sensor channel"
            ),
        }
    }

    async fn on_poll(&mut self, ctx: &mut ChannelContext) {
        if self.night_mode_reporting {
            let night = self.provider.night_mode().await;
            if self.last_night_mode != Some(night) && !self.send_night_mode(ctx, night).await {
                return;
            }
        }

        if self.location_reporting && self.location_connected && !ctx.is_stop_requested() {
            let Some(fix) = self.provider.location().await else {
                return;
            };
            if let Some(location) = encode_location(&fix) {
                ctx.send(OutboundMessage::SensorEvent(SensorBatch::Location(location)))
                    .await;
            }
        }
    }

    fn on_stop(&mut self, _ctx: &mut ChannelContext) {
        if self.location_connected {
            self.provider.disconnect();
            self.location_connected = false;
        }
        self.night_mode_reporting = false;
        self.location_reporting = false;
    }
}

/// Converts a fix into the fixed-point wire encoding. Fixes without a 2D/3D
/// solution, a timestamp or coordinates are dropped.
pub(crate) fn encode_location(fix: &GpsFix) -> Option<LocationData> {
    if fix.mode == FixMode::NoFix {
        return None;
    }
    let timestamp_s = fix.time_s?;
    let latitude = fix.latitude?;
    let longitude = fix.longitude?;

    let accuracy = (fix.epx * fix.epx + fix.epy * fix.epy).sqrt();
    let altitude = match fix.mode {
        FixMode::Fix3d => fix.altitude_m,
        _ => None,
    };

    Some(LocationData {
        timestamp_s,
        latitude_e7: (latitude * LOCATION_DEGREES_SCALE).round() as i32,
        longitude_e7: (longitude * LOCATION_DEGREES_SCALE).round() as i32,
        accuracy_e3: (accuracy * LOCATION_ACCURACY_SCALE).round() as u32,
        altitude_e2: altitude.map(|meters| (meters * LOCATION_ALTITUDE_SCALE).round() as i32),
        speed_e3: fix.speed_mps.map(|mps| {
            (mps * KNOTS_PER_METER_PER_SECOND * LOCATION_SPEED_SCALE).round() as i32
        }),
        bearing_e6: fix
            .track_deg
            .map(|degrees| (degrees * LOCATION_BEARING_SCALE).round() as i32),
    })
}
