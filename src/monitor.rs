//! Monitoring loop - fixed cadence probe cycles over all endpoints
//!
//! ## Cycle
//!
//! ```text
//!   shutdown? ──yes──► stop
//!      │no
//!      ▼
//!   reset offline gauge
//!      │
//!      ├── spawn ──► probe(url₁) → record → [alert]
//!      ├── spawn ──► probe(url₂) → record → [alert]
//!      └── spawn ──► probe(urlₙ) → record → [alert]
//!      │
//!   join all (barrier)
//!      │
//!   sleep until start + interval (or shutdown)
//!      └──────────────► next cycle
//! ```
//!
//! Cancellation is cooperative: a cycle that already started always runs to
//! completion, the signal is only observed between cycles. Probes are bounded
//! by their own request timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, trace};

use crate::alerts::AlertManager;
use crate::health::{HealthRecord, HealthStore, Transition};
use crate::metrics::MetricsSink;
use crate::probe::{Outcome, Probe};

/// Inputs of the monitoring loop
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Endpoints to probe, fixed for the whole run
    pub urls: Vec<String>,

    /// Period between the starts of two cycles
    pub check_interval: Duration,

    /// Consecutive failures needed before a down alert
    pub alert_threshold: u32,
}

/// Remaining idle time after a cycle that took `elapsed`
///
/// Zero when the cycle overran the interval, so the next one starts at once.
pub fn idle_delay(elapsed: Duration, interval: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Probes all endpoints each cycle and drives the alert latch
///
/// Cloning is cheap; all clones share the same health store.
#[derive(Clone)]
pub struct Monitor {
    urls: Arc<[String]>,
    check_interval: Duration,
    probe: Arc<dyn Probe>,
    store: Arc<HealthStore>,
    metrics: Arc<dyn MetricsSink>,
    alerts: AlertManager,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        probe: Arc<dyn Probe>,
        metrics: Arc<dyn MetricsSink>,
        alerts: AlertManager,
    ) -> Self {
        metrics.add_endpoints(config.urls.len() as u64);

        Self {
            urls: config.urls.into(),
            check_interval: config.check_interval,
            probe,
            store: Arc::new(HealthStore::new(config.alert_threshold)),
            metrics,
            alerts,
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Current health record of an endpoint (None before its first probe)
    pub fn health(&self, url: &str) -> Option<HealthRecord> {
        self.store.get(url)
    }

    pub fn store(&self) -> &HealthStore {
        &self.store
    }

    /// Spawn the loop in a background task
    pub fn spawn(self) -> MonitorHandle {
        MonitorHandle::spawn(self)
    }

    /// Run cycles until `shutdown` turns true or its sender goes away
    #[instrument(skip_all, fields(endpoints = self.urls.len()))]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "starting monitor for {} endpoints every {:?}",
            self.urls.len(),
            self.check_interval
        );

        loop {
            let stop = *shutdown.borrow();
            if stop || shutdown.has_changed().is_err() {
                break;
            }

            let start = Instant::now();
            self.run_cycle().await;

            let elapsed = start.elapsed();
            let idle = idle_delay(elapsed, self.check_interval);
            debug!("cycle took {elapsed:?}, idling for {idle:?}");

            if idle.is_zero() {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep_until(start + self.check_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("shutdown sender dropped");
                        break;
                    }
                }
            }
        }

        info!("monitor stopped");
    }

    /// Probe every endpoint in parallel and wait for all of them
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) {
        self.metrics.reset_offline();

        let mut tasks = JoinSet::new();
        for url in self.urls.iter() {
            let monitor = self.clone();
            let url = url.clone();
            tasks.spawn(async move { monitor.check(&url).await });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("probe task failed: {e}");
            }
        }
    }

    /// Probe one endpoint, record the outcome and send the resulting alert
    pub async fn check(&self, url: &str) {
        let outcome = self.probe.probe(url).await;
        trace!("{url}: {outcome:?}");

        // the store lock is released here, alerts go out without holding it
        match self.record_outcome(url, &outcome) {
            Transition::BecameDown(reason) => self.alerts.send_down_alert(url, &reason).await,
            Transition::BecameUp => self.alerts.send_recovery_alert(url).await,
            Transition::None => {}
        }
    }

    /// Update the metric instruments and the health record for one outcome
    pub fn record_outcome(&self, url: &str, outcome: &Outcome) -> Transition {
        match outcome.status_code() {
            Some(status) => {
                self.metrics.delete_status(url);
                self.metrics.set_status(url, i64::from(status));
            }
            None => self.metrics.set_status(url, 0),
        }

        if outcome.is_healthy() {
            self.metrics.reset_errors(url);
        } else {
            self.metrics.inc_offline();
            self.metrics.inc_errors(url);
        }

        self.store.record_outcome(url, outcome)
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("urls", &self.urls)
            .field("check_interval", &self.check_interval)
            .field("store", &self.store)
            .field("alerts", &self.alerts)
            .finish_non_exhaustive()
    }
}

/// Handle for controlling a running monitor loop
#[derive(Debug)]
pub struct MonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn spawn(monitor: Monitor) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(monitor.run(shutdown_rx));

        Self { shutdown_tx, task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal shutdown and wait for the in-flight cycle to finish
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let _ = self.shutdown_tx.send(true);
        self.task.await
    }
}
