//! Delivery channels: the transports that actually hand a message over and
//! report what happened to it afterwards.

#[cfg(feature = "gmail")]
pub mod gmail;
pub mod registry;
#[cfg(feature = "smtp")]
pub mod smtp;

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// A transport for one kind of mailbox provider.
///
/// The status probes are independent of each other and of [`send`](Self::send);
/// callers treat a failed probe as "signal absent".
#[async_trait]
pub trait DeliveryChannel: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> ChannelKind;

    /// Hand the message over to the provider.
    ///
    /// # Errors
    /// If the provider rejects the message or cannot be reached.
    async fn send(&self, from: &str, to: &str, subject: &str, body: &str)
    -> Result<(), ChannelError>;

    /// Whether a message to `to` with this subject bounced.
    ///
    /// # Errors
    /// If the provider cannot be queried.
    async fn check_bounce(&self, to: &str, subject: &str, body: &str)
    -> Result<bool, ChannelError>;

    /// Whether the recipient opened the message.
    ///
    /// # Errors
    /// If the provider cannot be queried.
    async fn check_open(&self, to: &str, subject: &str, body: &str) -> Result<bool, ChannelError>;

    /// Whether the message landed in spam.
    ///
    /// # Errors
    /// If the provider cannot be queried.
    async fn check_spam(&self, to: &str, subject: &str, body: &str) -> Result<bool, ChannelError>;
}

/// Tag selecting a channel implementation for a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Smtp,
    #[serde(alias = "google")]
    Gmail,
    Outlook,
}

impl ChannelKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Smtp => "smtp",
            Self::Gmail => "gmail",
            Self::Outlook => "outlook",
        }
    }
}

impl Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "smtp" => Ok(Self::Smtp),
            "gmail" | "google" => Ok(Self::Gmail),
            "outlook" => Ok(Self::Outlook),
            other => Err(ChannelError::Configuration(format!(
                "unknown channel kind {other}"
            ))),
        }
    }
}

/// Connection settings shared by every tenant using a given channel kind.
///
/// A kind only needs settings if some tenant is mapped to it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelSettings {
    #[cfg(feature = "smtp")]
    #[serde(default)]
    pub smtp: Option<smtp::SmtpConfig>,

    #[cfg(feature = "gmail")]
    #[serde(default)]
    pub gmail: Option<gmail::GmailConfig>,
}
