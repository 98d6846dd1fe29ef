//! Probe executor - one HTTP GET against one endpoint
//!
//! A probe never fails: every problem on the way to a response (bad URL,
//! connection refused, timeout) and every non-2xx answer is folded into
//! [`Outcome::Unhealthy`] so the monitoring loop can treat the result as data.
//!
//! ```text
//! GET url ─┬─ build error ──────────► Unhealthy(Request)
//!          ├─ send error / timeout ─► Unhealthy(Transport)
//!          └─ response ─┬─ 2xx ─────► Healthy
//!                       └─ other ───► Unhealthy(Status)
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{instrument, trace};

/// Why a probe was classified as unhealthy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// The request could not be constructed (e.g. malformed URL)
    Request(String),

    /// The request was sent but no response arrived (DNS, connect, timeout, ...)
    Transport(String),

    /// A response arrived with a status outside of `200..300`
    Status(u16),
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::Request(err) | ProbeFailure::Transport(err) => {
                write!(f, "unreachable: {err}")
            }
            ProbeFailure::Status(code) => write!(f, "returned status {code}"),
        }
    }
}

/// Result of probing one endpoint once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The endpoint answered with a 2xx status
    Healthy { status: u16 },

    /// The endpoint could not be reached or answered with a non-2xx status
    Unhealthy(ProbeFailure),
}

impl Outcome {
    /// Classify a received HTTP status code
    pub fn from_status(status: u16) -> Self {
        if (200..300).contains(&status) {
            Outcome::Healthy { status }
        } else {
            Outcome::Unhealthy(ProbeFailure::Status(status))
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Outcome::Healthy { .. })
    }

    /// HTTP status code, if a response arrived at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Outcome::Healthy { status } => Some(*status),
            Outcome::Unhealthy(ProbeFailure::Status(status)) => Some(*status),
            Outcome::Unhealthy(_) => None,
        }
    }
}

/// Capability to check a single endpoint
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str) -> Outcome;
}

/// Production probe backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    /// Build a probe whose requests are all bounded by `timeout`
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Wrap an already configured client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    #[instrument(skip(self))]
    async fn probe(&self, url: &str) -> Outcome {
        let request = match self.client.get(url).build() {
            Ok(request) => request,
            Err(e) => return Outcome::Unhealthy(ProbeFailure::Request(e.to_string())),
        };

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => return Outcome::Unhealthy(ProbeFailure::Transport(e.to_string())),
        };

        let status = response.status().as_u16();
        trace!("{url}: received status {status}");

        Outcome::from_status(status)
    }
}
