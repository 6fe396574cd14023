use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::TenantId;

/// Failure to decode or encode an inbound send request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Malformed send request: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One inbound "send email" event.
///
/// On the wire this is a JSON object:
/// `{"toAddress": "...", "tenantId": "...", "subject": "...", "body": "..."}`.
/// `subject` and `body` may be omitted and default to empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub to_address: String,
    pub tenant_id: TenantId,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

impl SendRequest {
    #[must_use]
    pub fn new(
        tenant_id: impl Into<TenantId>,
        to_address: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to_address: to_address.into(),
            tenant_id: tenant_id.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Decode a request from its JSON wire form.
    ///
    /// # Errors
    /// If the payload is not valid JSON or lacks `toAddress`/`tenantId`.
    pub fn from_json(payload: &[u8]) -> Result<Self, RequestError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Encode this request into its JSON wire form.
    ///
    /// # Errors
    /// If serialisation fails.
    pub fn to_json(&self) -> Result<Vec<u8>, RequestError> {
        Ok(serde_json::to_vec(self)?)
    }
}
