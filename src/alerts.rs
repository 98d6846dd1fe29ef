use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use crate::probe::ProbeFailure;

/// Errors raised while delivering an alert
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("failed to compose message: {0}")]
    Compose(String),

    #[error("transport failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Capability to deliver a plain text alert
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), DeliveryError>;
}

pub fn down_subject(url: &str, reason: &ProbeFailure) -> String {
    format!("[🚨 DOWN] {url} ({reason})")
}

pub fn down_body(url: &str, reason: &ProbeFailure) -> String {
    format!("{url}: {reason}")
}

pub fn recovery_subject(url: &str) -> String {
    format!("[✅ UP] {url} is back online")
}

pub fn recovery_body(url: &str) -> String {
    format!("{url} is back online")
}

/// Formats down/recovery alerts and hands them to the configured notifier
///
/// Delivery failures are logged and dropped; they never reach the caller.
#[derive(Clone, Default)]
pub struct AlertManager {
    notifier: Option<Arc<dyn Notifier>>,
}

impl AlertManager {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier: Some(notifier),
        }
    }

    /// Alert manager that only logs alerts
    pub fn disabled() -> Self {
        Self { notifier: None }
    }

    #[instrument(skip(self))]
    pub async fn send_down_alert(&self, url: &str, reason: &ProbeFailure) {
        info!("{url} is down: {reason}");
        self.deliver(&down_subject(url, reason), &down_body(url, reason))
            .await;
    }

    #[instrument(skip(self))]
    pub async fn send_recovery_alert(&self, url: &str) {
        info!("{url} is back online");
        self.deliver(&recovery_subject(url), &recovery_body(url)).await;
    }

    async fn deliver(&self, subject: &str, body: &str) {
        let Some(notifier) = &self.notifier else {
            warn!("no notifier configured, dropping alert '{subject}'");
            return;
        };

        match notifier.send(subject, body).await {
            Ok(()) => info!("alert sent: '{subject}'"),
            Err(e) => error!("failed to send alert '{subject}': {e}"),
        }
    }
}

impl std::fmt::Debug for AlertManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertManager")
            .field("enabled", &self.notifier.is_some())
            .finish()
    }
}
