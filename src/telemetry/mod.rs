//! Tracing subscriber setup and structured session events.

pub mod events;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

#[derive(Debug, Clone)]
pub struct TracingOptions {
    /// Filter used when `RUST_LOG` is not set.
    pub default_filter: String,
    pub json: bool,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: false,
        }
    }
}

/// Installs the global subscriber. Keep the returned guard alive for as long
/// as logs should be flushed.
pub fn init_tracing(options: &TracingOptions) -> anyhow::Result<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.default_filter))
        .context("invalid tracing filter")?;
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    if options.json {
        let subscriber = Registry::default()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(writer));
        tracing::subscriber::set_global_default(subscriber)
            .context("failed to set global subscriber")?;
    } else {
        let subscriber = Registry::default()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_writer(writer));
        tracing::subscriber::set_global_default(subscriber)
            .context("failed to set global subscriber")?;
    }

    Ok(guard)
}
