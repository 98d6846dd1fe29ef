//! Write-only metric instruments updated by the monitoring loop
//!
//! The loop only talks to [`MetricsSink`]; [`PrometheusMetrics`] is the
//! production implementation and renders the text exposition format for the
//! `/metrics` endpoint.

use prometheus::{Encoder, IntCounter, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

/// Instruments the monitoring loop writes to
///
/// Implementations must be safe for concurrent use from many probe tasks.
pub trait MetricsSink: Send + Sync {
    /// Set the status series of `url` (HTTP status, or 0 without a response)
    fn set_status(&self, url: &str, status: i64);

    /// Remove the status series of `url`
    fn delete_status(&self, url: &str);

    /// Add to the number of monitored endpoints
    fn add_endpoints(&self, count: u64);

    /// Reset the number of offline endpoints at the start of a cycle
    fn reset_offline(&self);

    /// Count one more offline endpoint in the current cycle
    fn inc_offline(&self);

    /// Count one more failed probe for `url`
    fn inc_errors(&self, url: &str);

    /// Reset the failed probe count of `url`
    fn reset_errors(&self, url: &str);
}

const URL_LABEL: &str = "url";

/// Prometheus-backed instruments on a private registry
#[derive(Debug, Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    site_status: IntGaugeVec,
    sites: IntCounter,
    offline_sites: IntGauge,
    error_sites: IntGaugeVec,
}

impl PrometheusMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let site_status = IntGaugeVec::new(
            Opts::new(
                "site_status",
                "The summary of monitored sites and their response-codes",
            ),
            &[URL_LABEL],
        )?;
        let sites = IntCounter::new("sites", "The number of monitored sites")?;
        let offline_sites = IntGauge::new("offline_sites", "The number of offline sites")?;
        let error_sites = IntGaugeVec::new(
            Opts::new("error_sites", "How long the sites are offline"),
            &[URL_LABEL],
        )?;

        registry.register(Box::new(site_status.clone()))?;
        registry.register(Box::new(sites.clone()))?;
        registry.register(Box::new(offline_sites.clone()))?;
        registry.register(Box::new(error_sites.clone()))?;

        Ok(Self {
            registry,
            site_status,
            sites,
            offline_sites,
            error_sites,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all instruments in the Prometheus text exposition format
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl MetricsSink for PrometheusMetrics {
    fn set_status(&self, url: &str, status: i64) {
        self.site_status.with_label_values(&[url]).set(status);
    }

    fn delete_status(&self, url: &str) {
        // absent series are fine, there is nothing to delete yet
        let _ = self.site_status.remove_label_values(&[url]);
    }

    fn add_endpoints(&self, count: u64) {
        self.sites.inc_by(count);
    }

    fn reset_offline(&self) {
        self.offline_sites.set(0);
    }

    fn inc_offline(&self) {
        self.offline_sites.inc();
    }

    fn inc_errors(&self, url: &str) {
        self.error_sites.with_label_values(&[url]).inc();
    }

    fn reset_errors(&self, url: &str) {
        self.error_sites.with_label_values(&[url]).set(0);
    }
}
