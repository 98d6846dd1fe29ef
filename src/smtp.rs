//! SMTP transport for alerts

use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument};

use crate::alerts::{DeliveryError, Notifier};
use crate::config::SmtpConfig;

/// Errors raised while setting up the SMTP transport
#[derive(Debug, thiserror::Error)]
pub enum SmtpSetupError {
    #[error("invalid mailbox address '{address}': {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },

    #[error("invalid smtp relay '{server}': {source}")]
    Relay {
        server: String,
        source: lettre::transport::smtp::Error,
    },
}

/// Delivers alerts as plain text mails through a STARTTLS relay
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpSetupError> {
        let from = parse_mailbox(&config.from)?;
        let to = parse_mailbox(&config.to)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
            .map_err(|source| SmtpSetupError::Relay {
                server: config.server.clone(),
                source,
            })?
            .port(config.port)
            .credentials(Credentials::new(
                config.user.clone(),
                config.pass.clone(),
            ))
            .build();

        Ok(Self { transport, from, to })
    }

    fn compose(&self, subject: &str, body: &str) -> Result<Message, DeliveryError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| DeliveryError::Compose(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SmtpSetupError> {
    address
        .parse()
        .map_err(|source| SmtpSetupError::Address {
            address: address.to_string(),
            source,
        })
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(skip(self, body), fields(to = %self.to))]
    async fn send(&self, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let message = self.compose(subject, body)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Transport(Box::new(e)))?;

        debug!("smtp relay answered {}", response.code());
        Ok(())
    }
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("from", &self.from.to_string())
            .field("to", &self.to.to_string())
            .finish()
    }
}
