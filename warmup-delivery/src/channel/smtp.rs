//! SMTP relay channel.
//!
//! Relays through a single authenticated submission server. SMTP has no way
//! to report what happened after the relay accepted the message, so the
//! status probes return fixed answers: never bounced, always opened, never
//! spam.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use serde::Deserialize;
use tracing::debug;

use super::{ChannelKind, DeliveryChannel};
use crate::error::ChannelError;

/// Submission server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,

    /// Default: 587
    #[serde(default = "defaults::port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Upgrade the connection with STARTTLS before authenticating.
    ///
    /// Default: `true`
    #[serde(default = "defaults::starttls")]
    pub starttls: bool,

    /// Per-command timeout (in seconds).
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
}

mod defaults {
    pub const fn port() -> u16 {
        587
    }

    pub const fn starttls() -> bool {
        true
    }

    pub const fn timeout_secs() -> u64 {
        30
    }
}

pub struct SmtpChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl std::fmt::Debug for SmtpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpChannel")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl SmtpChannel {
    /// Build a relay transport. No connection is made until the first send.
    ///
    /// # Errors
    /// If the relay host is invalid for TLS, or only one of
    /// `username`/`password` is set.
    pub fn new(config: &SmtpConfig) -> Result<Self, ChannelError> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| ChannelError::Configuration(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        let builder = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            (None, None) => builder,
            _ => {
                return Err(ChannelError::Configuration(
                    "smtp username and password must be set together".to_string(),
                ));
            }
        };

        Ok(Self {
            transport: builder.build(),
            host: config.host.clone(),
        })
    }
}

/// Assemble a plain-text message.
///
/// # Errors
/// If either address does not parse as a mailbox.
pub fn build_message(
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<Message, ChannelError> {
    let from: Mailbox = from
        .parse()
        .map_err(|e| ChannelError::Send(format!("invalid sender {from}: {e}")))?;
    let to: Mailbox = to
        .parse()
        .map_err(|e| ChannelError::Send(format!("invalid recipient {to}: {e}")))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| ChannelError::Send(e.to_string()))
}

#[async_trait]
impl DeliveryChannel for SmtpChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Smtp
    }

    async fn send(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), ChannelError> {
        let message = build_message(from, to, subject, body)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))?;

        debug!(host = %self.host, code = %response.code(), "relay accepted message");
        Ok(())
    }

    async fn check_bounce(&self, _to: &str, _subject: &str, _body: &str) -> Result<bool, ChannelError> {
        Ok(false)
    }

    async fn check_open(&self, _to: &str, _subject: &str, _body: &str) -> Result<bool, ChannelError> {
        Ok(true)
    }

    async fn check_spam(&self, _to: &str, _subject: &str, _body: &str) -> Result<bool, ChannelError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtpConfig {
        ron::from_str(r#"(host: "localhost", starttls: false)"#).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = config();
        assert_eq!(config.port, 587);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.username.is_none());
    }

    #[test]
    fn test_build_message() {
        let message = build_message("warm@acme.io", "bob@example.com", "Hello", "Body text").unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();

        assert!(formatted.contains("From: warm@acme.io"));
        assert!(formatted.contains("To: bob@example.com"));
        assert!(formatted.contains("Subject: Hello"));
        assert!(formatted.contains("Body text"));
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        assert!(matches!(
            build_message("not an address", "bob@example.com", "", ""),
            Err(ChannelError::Send(_))
        ));
    }

    #[test]
    fn test_half_configured_credentials_rejected() {
        let config = SmtpConfig {
            username: Some("user".to_string()),
            ..config()
        };
        assert!(matches!(
            SmtpChannel::new(&config),
            Err(ChannelError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_fixed_status_answers() {
        let channel = SmtpChannel::new(&config()).unwrap();
        assert_eq!(channel.kind(), ChannelKind::Smtp);
        assert!(!channel.check_bounce("bob@example.com", "s", "b").await.unwrap());
        assert!(channel.check_open("bob@example.com", "s", "b").await.unwrap());
        assert!(!channel.check_spam("bob@example.com", "s", "b").await.unwrap());
    }
}
