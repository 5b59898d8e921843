//! # Periodic threshold monitor
//!
//! A [`Check`] is evaluated once as soon as the platform is ready and then
//! again after each interval, measured from the end of the previous run. A
//! failing run is logged and counted; the schedule carries on regardless.

pub mod dedupe;
pub mod registry;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use async_trait::async_trait;
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::{platform::PlatformError, store::StoreError};

pub use dedupe::DedupeRecord;
pub use registry::MonitorRegistry;

/// Future resolving once the monitor may start ticking.
pub type Readiness = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
    #[error("platform failure: {0}")]
    Platform(#[from] PlatformError),
    #[error("monitor '{0}' is already running")]
    AlreadyRunning(&'static str),
    #[error("monitor '{monitor}' tick panicked: {details}")]
    Panicked {
        monitor: &'static str,
        details: String,
    },
}

/// Outcome counters for one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Subscriptions or guilds examined.
    pub evaluated: u64,
    /// Notifications or leaves performed.
    pub acted: u64,
    /// Entities skipped (inactive locator, unknown data).
    pub skipped: u64,
    /// Per-entity failures that did not abort the tick.
    pub failed: u64,
}

/// Work performed on every tick of a [`PeriodicMonitor`].
#[async_trait]
pub trait Check: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Delay before the next run, re-read after every tick.
    async fn interval(&self) -> Duration;

    async fn tick(&self) -> Result<TickReport, MonitorError>;
}

pub struct PeriodicMonitor {
    check: Arc<dyn Check>,
}

impl PeriodicMonitor {
    pub fn new(check: Arc<dyn Check>) -> Self {
        Self { check }
    }

    pub fn name(&self) -> &'static str {
        self.check.name()
    }

    #[instrument(skip_all, fields(monitor = self.check.name()))]
    pub async fn run(self, ready: Readiness, shutdown: CancellationToken) {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Monitor cancelled before platform became ready");
                return;
            }
            _ = ready => {}
        }

        info!("Starting monitor");
        loop {
            // Errors are already logged and counted inside run_once.
            let _ = self.run_once().await;

            let interval = self.check.interval().await;
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Monitor shutdown requested");
                    break;
                }
                _ = sleep(interval) => {}
            }
        }
        info!("Monitor stopped");
    }

    /// Runs a single tick, isolating panics so the schedule survives them.
    pub async fn run_once(&self) -> Result<TickReport, MonitorError> {
        let name = self.check.name();
        let started = Instant::now();

        let check = Arc::clone(&self.check);
        let outcome = match tokio::spawn(async move { check.tick().await }).await {
            Ok(result) => result,
            Err(join_err) => Err(MonitorError::Panicked {
                monitor: name,
                details: join_err.to_string(),
            }),
        };

        histogram!("monitor_tick_duration_ms", "monitor" => name)
            .record(started.elapsed().as_secs_f64() * 1_000.0);

        match &outcome {
            Ok(report) => debug!(
                evaluated = report.evaluated,
                acted = report.acted,
                skipped = report.skipped,
                failed = report.failed,
                "Monitor tick completed"
            ),
            Err(err) => {
                counter!("monitor_tick_failures_total", "monitor" => name).increment(1);
                error!(error = %err, "Monitor tick failed");
            }
        }

        outcome
    }
}
