//! Session orchestration: owns the channel services of one connected device.

mod control;
mod factory;
pub mod lifecycle;

pub use control::build_discovery_response;
pub use factory::{DeviceSet, ServiceFactory};
pub use lifecycle::{PhaseUpdate, SessionEndReason, SessionEvent, SessionPhase};

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::HeadUnitConfig;
use crate::error::SessionError;
use crate::service::{RunningService, ServiceHandle, EVENT_BUS_CAPACITY};
use crate::shutdown::{shutdown_all, ShutdownReport, ShutdownToken};
use crate::telemetry::events::record_shutdown_completed;
use crate::transport::{ChannelId, ServiceDiscoveryResponse, Transport};

use self::control::ControlChannel;

/// Result of [`SessionOrchestrator::run_until_end`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub reason: SessionEndReason,
    pub report: ShutdownReport,
}

pub struct SessionOrchestrator {
    config: Arc<HeadUnitConfig>,
    transport: Arc<dyn Transport>,
    phase: SessionPhase,
    services: Vec<RunningService>,
    control_token: ShutdownToken,
    control_task: Option<JoinHandle<()>>,
    events_tx: broadcast::Sender<SessionEvent>,
    end_rx: broadcast::Receiver<SessionEvent>,
}

impl SessionOrchestrator {
    /// Spawns one actor per configured channel. Must be called from within a
    /// tokio runtime.
    pub fn new(
        config: Arc<HeadUnitConfig>,
        transport: Arc<dyn Transport>,
        devices: DeviceSet,
    ) -> Result<Self, SessionError> {
        let (events_tx, end_rx) = broadcast::channel(EVENT_BUS_CAPACITY);
        let services = ServiceFactory::new(
            Arc::clone(&config),
            Arc::clone(&transport),
            events_tx.clone(),
        )
        .build(devices)?;

        Ok(Self {
            config,
            transport,
            phase: SessionPhase::Idle,
            services,
            control_token: ShutdownToken::new(),
            control_task: None,
            events_tx,
            end_rx,
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    pub fn channels(&self) -> Vec<ChannelId> {
        self.services.iter().map(RunningService::channel_id).collect()
    }

    pub fn service_handles(&self) -> Vec<ServiceHandle> {
        self.services
            .iter()
            .map(|service| service.handle().clone())
            .collect()
    }

    pub async fn start(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Idle => {}
            SessionPhase::Running => return Err(SessionError::AlreadyStarted),
            SessionPhase::Stopping | SessionPhase::Stopped => {
                return Err(SessionError::AlreadyStopped)
            }
        }

        for service in &self.services {
            service.handle().start().await?;
        }

        let control = ControlChannel::new(
            Arc::clone(&self.transport),
            self.control_token.clone(),
            Arc::clone(&self.config),
            self.service_handles(),
            self.events_tx.clone(),
        );
        self.control_task = Some(control.spawn());
        self.set_phase(SessionPhase::Running);
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), SessionError> {
        self.ensure_running()?;
        for service in &self.services {
            service.handle().pause().await?;
        }
        info!(target: "session_orchestrator", "session paused");
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), SessionError> {
        self.ensure_running()?;
        for service in &self.services {
            service.handle().resume().await?;
        }
        info!(target: "session_orchestrator", "session resumed");
        Ok(())
    }

    /// Collects one live capability descriptor per service.
    pub async fn discover(&self) -> Result<ServiceDiscoveryResponse, SessionError> {
        self.ensure_running()?;
        build_discovery_response(&self.config, &self.service_handles()).await
    }

    /// Stops the control channel and every service. The session only counts
    /// as stopped once each actor acknowledged or was aborted.
    pub async fn shutdown(&mut self) -> Result<ShutdownReport, SessionError> {
        if matches!(self.phase, SessionPhase::Stopping | SessionPhase::Stopped) {
            return Err(SessionError::AlreadyStopped);
        }
        self.set_phase(SessionPhase::Stopping);

        let deadline = self.config.shutdown_timeout();
        self.control_token.trigger();
        self.transport.cancel(ChannelId::Control);
        if let Some(mut task) = self.control_task.take() {
            if timeout(deadline, &mut task).await.is_err() {
                warn!(target: "shutdown", "control channel did not stop in time");
                task.abort();
            }
        }

        let services = std::mem::take(&mut self.services);
        let report = shutdown_all(services, deadline).await;
        record_shutdown_completed(&report);
        self.set_phase(SessionPhase::Stopped);
        Ok(report)
    }

    /// Waits for the first end trigger, then shuts the session down.
    pub async fn run_until_end(&mut self) -> Result<SessionSummary, SessionError> {
        self.ensure_running()?;

        let reason = loop {
            match self.end_rx.recv().await {
                Ok(event) => {
                    if let Some(reason) = event.end_reason() {
                        break reason;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target: "session_orchestrator", skipped, "session events lagged");
                }
                Err(RecvError::Closed) => {
                    break SessionEndReason::ControlChannelFailed {
                        reason: "session event bus closed".to_string(),
                    };
                }
            }
        };

        info!(target: "session_orchestrator", ?reason, "session ending");
        let report = self.shutdown().await?;
        Ok(SessionSummary { reason, report })
    }

    fn ensure_running(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Running => Ok(()),
            SessionPhase::Stopping | SessionPhase::Stopped => Err(SessionError::AlreadyStopped),
            SessionPhase::Idle => Err(SessionError::NotRunning),
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        info!(
            target: "session_orchestrator",
            from = self.phase.as_str(),
            to = phase.as_str(),
            "session phase changed"
        );
        self.phase = phase;
        let _ = self
            .events_tx
            .send(SessionEvent::PhaseChanged(PhaseUpdate::new(phase)));
    }
}

impl Drop for SessionOrchestrator {
    fn drop(&mut self) {
        self.control_token.trigger();
        if let Some(task) = self.control_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests;
