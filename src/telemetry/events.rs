use serde::Serialize;
use tracing::{info, warn};

use crate::error::TransportError;
use crate::shutdown::ShutdownReport;
use crate::transport::{ChannelId, ServiceDiscoveryResponse};

pub(crate) const TARGET: &str = "telemetry::session";
pub(crate) const EVENT_DISCOVERY: &str = "service_discovery";
pub(crate) const EVENT_CHANNEL_ERROR: &str = "channel_error";
pub(crate) const EVENT_SHUTDOWN: &str = "shutdown_completed";

#[derive(Debug, Serialize)]
pub struct ServiceDiscoveryEvent<'a> {
    pub display_name: &'a str,
    pub channels: Vec<ChannelId>,
}

#[derive(Debug, Serialize)]
pub struct ChannelErrorEvent {
    pub channel: ChannelId,
    pub error: String,
    pub stops_channel: bool,
}

pub fn record_service_discovery(response: &ServiceDiscoveryResponse) {
    let event = ServiceDiscoveryEvent {
        display_name: &response.display_name,
        channels: response
            .channels
            .iter()
            .map(|descriptor| descriptor.channel_id)
            .collect(),
    };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_DISCOVERY,
            channel_count = event.channels.len(),
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_DISCOVERY,
            %err,
            "failed to encode service discovery event"
        ),
    }
}

pub fn record_channel_error(channel: ChannelId, error: &TransportError, stops_channel: bool) {
    let event = ChannelErrorEvent {
        channel,
        error: error.to_string(),
        stops_channel,
    };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_CHANNEL_ERROR,
            %channel,
            stops_channel,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_CHANNEL_ERROR,
            %err,
            "failed to encode channel error event"
        ),
    }
}

pub fn record_shutdown_completed(report: &ShutdownReport) {
    match serde_json::to_string(report) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_SHUTDOWN,
            acknowledged = report.acknowledged.len(),
            missing = report.missing.len(),
            elapsed_ms = report.elapsed_ms,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_SHUTDOWN,
            %err,
            "failed to encode shutdown event"
        ),
    }
}
