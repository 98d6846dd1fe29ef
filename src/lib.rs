//! Periodic HTTP endpoint prober with threshold alerting
//!
//! ```text
//! Monitor ──(per cycle, in parallel)──► Probe × N
//!    │                                     │ Outcome
//!    │                                     ▼
//!    │                               HealthStore ──► Transition
//!    │                                     │
//!    └── MetricsSink ◄─────────────────────┴──► AlertManager ──► Notifier
//! ```

pub mod alerts;
pub mod config;
pub mod health;
pub mod metrics;
pub mod monitor;
pub mod probe;
pub mod server;
pub mod smtp;
pub mod util;

pub use alerts::{AlertManager, DeliveryError, Notifier};
pub use health::{HealthRecord, HealthStore, Transition};
pub use metrics::{MetricsSink, PrometheusMetrics};
pub use monitor::{Monitor, MonitorConfig, MonitorHandle};
pub use probe::{HttpProbe, Outcome, Probe, ProbeFailure};
