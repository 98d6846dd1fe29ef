//! Per-endpoint health state and the down/up alert latch
//!
//! ## Threshold latch
//!
//! ```text
//! Unhealthy:
//!   failures += 1
//!   !alerting && failures >= threshold  → BecameDown (alerting = true)
//!   otherwise                           → None
//!
//! Healthy:
//!   failures = 0
//!   alerting                            → BecameUp (alerting = false)
//!   otherwise                           → None
//! ```
//!
//! Once latched, further failures stay silent until a success re-arms the
//! latch, which then needs `threshold` fresh consecutive failures to fire again.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::trace;

use crate::probe::{Outcome, ProbeFailure};

/// Threshold used when none is configured: alert on the first failure
pub const DEFAULT_ALERT_THRESHOLD: u32 = 1;

/// Health state of a single endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthRecord {
    /// Failed probes since the last success
    pub consecutive_failures: u32,

    /// A down alert went out and no recovery alert has followed yet
    pub alerting: bool,
}

/// Alert-worthy change produced by recording one outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    None,
    BecameDown(ProbeFailure),
    BecameUp,
}

impl HealthRecord {
    /// Apply one outcome to this record and report the resulting transition
    pub fn apply(&mut self, outcome: &Outcome, threshold: u32) -> Transition {
        match outcome {
            Outcome::Unhealthy(reason) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if !self.alerting && self.consecutive_failures >= threshold {
                    self.alerting = true;
                    Transition::BecameDown(reason.clone())
                } else {
                    Transition::None
                }
            }
            Outcome::Healthy { .. } => {
                self.consecutive_failures = 0;
                if self.alerting {
                    self.alerting = false;
                    Transition::BecameUp
                } else {
                    Transition::None
                }
            }
        }
    }
}

/// Owner of all health records for one run
///
/// Every read-modify-write happens inside one critical section, so concurrent
/// probes for different endpoints never observe each other's partial updates.
#[derive(Debug)]
pub struct HealthStore {
    threshold: u32,
    records: Mutex<HashMap<String, HealthRecord>>,
}

impl HealthStore {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Record the outcome of one probe and return the alert transition it caused
    pub fn record_outcome(&self, url: &str, outcome: &Outcome) -> Transition {
        // a panicking holder cannot leave a record half-written, so the map stays usable
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let record = records.entry(url.to_string()).or_default();
        let transition = record.apply(outcome, self.threshold);

        trace!(
            "{url}: failures {}/{}, alerting={} → {transition:?}",
            record.consecutive_failures, self.threshold, record.alerting
        );

        transition
    }

    /// Snapshot of a single endpoint's record
    pub fn get(&self, url: &str) -> Option<HealthRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.get(url).copied()
    }

    /// Snapshot of all records
    pub fn snapshot(&self) -> HashMap<String, HealthRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for HealthStore {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_THRESHOLD)
    }
}
