//! Gmail REST API channel.
//!
//! Sends through `users.messages.send` and answers the status probes with
//! mailbox searches against the sending account.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE};
use serde::{Deserialize, Serialize, de::IgnoredAny};
use tracing::debug;

use super::{ChannelKind, DeliveryChannel};
use crate::error::ChannelError;

/// Gmail API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GmailConfig {
    /// OAuth bearer token with send and read-only scopes.
    pub access_token: String,

    /// Default: `https://gmail.googleapis.com`
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Mailbox the searches run against.
    ///
    /// Default: `me` (the token's own account)
    #[serde(default = "defaults::user_id")]
    pub user_id: String,

    /// Request timeout (in seconds).
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
}

mod defaults {
    pub fn api_base() -> String {
        "https://gmail.googleapis.com".to_string()
    }

    pub fn user_id() -> String {
        "me".to_string()
    }

    pub const fn timeout_secs() -> u64 {
        30
    }
}

#[derive(Serialize)]
struct SendBody {
    raw: String,
}

#[derive(Debug, Default, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<IgnoredAny>,
}

#[derive(Debug, Clone)]
pub struct GmailChannel {
    client: reqwest::Client,
    config: GmailConfig,
}

impl GmailChannel {
    /// # Errors
    /// If the HTTP client cannot be built.
    pub fn new(config: GmailConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChannelError::Configuration(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn messages_url(&self, user_id: &str) -> String {
        format!(
            "{}/gmail/v1/users/{user_id}/messages",
            self.config.api_base.trim_end_matches('/')
        )
    }

    /// Number of messages in the mailbox matching `query`.
    async fn search(&self, query: &str) -> Result<usize, ChannelError> {
        let response = self
            .client
            .get(self.messages_url(&self.config.user_id))
            .bearer_auth(&self.config.access_token)
            .query(&[("q", query)])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ChannelError::Check(e.to_string()))?;

        let list: ListResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::Check(e.to_string()))?;

        debug!(query, matches = list.messages.len(), "mailbox search");
        Ok(list.messages.len())
    }
}

/// RFC 5322 message as the API's `raw` field expects it, before encoding.
#[must_use]
pub fn raw_message(from: &str, to: &str, subject: &str, body: &str) -> String {
    format!("From: {from}\r\nTo: {to}\r\nSubject: {subject}\r\n\r\n{body}")
}

#[must_use]
pub fn bounce_query(to: &str) -> String {
    format!("from:mailer-daemon@googlemail.com to:{to} subject:bounced")
}

#[must_use]
pub fn unread_query(to: &str, subject: &str) -> String {
    format!("to:{to} subject:{subject:?} label:UNREAD")
}

#[must_use]
pub fn spam_query(to: &str, subject: &str) -> String {
    format!("to:{to} subject:{subject:?} in:spam")
}

#[async_trait]
impl DeliveryChannel for GmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Gmail
    }

    async fn send(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), ChannelError> {
        let raw = URL_SAFE.encode(raw_message(from, to, subject, body));

        self.client
            .post(format!("{}/send", self.messages_url(from)))
            .bearer_auth(&self.config.access_token)
            .json(&SendBody { raw })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ChannelError::Send(e.to_string()))?;

        Ok(())
    }

    async fn check_bounce(&self, to: &str, _subject: &str, _body: &str) -> Result<bool, ChannelError> {
        Ok(self.search(&bounce_query(to)).await? > 0)
    }

    /// A message still marked unread has not been opened.
    async fn check_open(&self, to: &str, subject: &str, _body: &str) -> Result<bool, ChannelError> {
        Ok(self.search(&unread_query(to, subject)).await? == 0)
    }

    async fn check_spam(&self, to: &str, subject: &str, _body: &str) -> Result<bool, ChannelError> {
        Ok(self.search(&spam_query(to, subject)).await? > 0)
    }
}
