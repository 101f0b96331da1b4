use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::service::RunningService;
use crate::transport::ChannelId;

/// Outcome of a coordinated shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Channels whose actor acknowledged the stop and exited.
    pub acknowledged: Vec<ChannelId>,
    /// Channels that overran the deadline and were aborted.
    pub missing: Vec<ChannelId>,
    pub elapsed_ms: u64,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Stops every service concurrently and waits until each one has either
/// acknowledged or been aborted.
pub async fn shutdown_all(services: Vec<RunningService>, deadline: Duration) -> ShutdownReport {
    let started = Instant::now();
    let total = services.len();
    info!(target: "shutdown", services = total, ?deadline, "coordinated shutdown started");

    let mut pending = JoinSet::new();
    for service in services {
        pending.spawn(async move {
            let channel = service.channel_id();
            let acknowledged = service.stop_and_join(deadline).await;
            (channel, acknowledged)
        });
    }

    let mut report = ShutdownReport::default();
    while let Some(joined) = pending.join_next().await {
        match joined {
            Ok((channel, true)) => report.acknowledged.push(channel),
            Ok((channel, false)) => {
                warn!(target: "shutdown", %channel, "service missing from shutdown");
                report.missing.push(channel);
            }
            Err(err) => error!(target: "shutdown", %err, "shutdown task failed"),
        }
    }

    report.acknowledged.sort();
    report.missing.sort();
    report.elapsed_ms = started.elapsed().as_millis().min(u64::MAX as u128) as u64;

    info!(
        target: "shutdown",
        acknowledged = report.acknowledged.len(),
        missing = report.missing.len(),
        elapsed_ms = report.elapsed_ms,
        "coordinated shutdown finished"
    );
    report
}
