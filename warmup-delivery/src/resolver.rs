//! Tenant to sender address resolution.

use ahash::AHashMap;
use async_trait::async_trait;
use warmup_common::TenantId;

use crate::error::ResolveError;

/// Maps a tenant to the address its warmup mail is sent from.
#[async_trait]
pub trait AddressResolver: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// If the tenant has no sender address or the lookup fails.
    async fn resolve(&self, tenant: &TenantId) -> Result<String, ResolveError>;
}

/// Resolver backed by a fixed map from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticAddressResolver {
    senders: AHashMap<TenantId, String>,
}

impl StaticAddressResolver {
    #[must_use]
    pub const fn new(senders: AHashMap<TenantId, String>) -> Self {
        Self { senders }
    }

    #[must_use]
    pub fn contains(&self, tenant: &TenantId) -> bool {
        self.senders.contains_key(tenant)
    }
}

impl FromIterator<(TenantId, String)> for StaticAddressResolver {
    fn from_iter<I: IntoIterator<Item = (TenantId, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[async_trait]
impl AddressResolver for StaticAddressResolver {
    async fn resolve(&self, tenant: &TenantId) -> Result<String, ResolveError> {
        self.senders
            .get(tenant)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownTenant(tenant.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_resolution() {
        let resolver: StaticAddressResolver =
            [(TenantId::from("acme"), "warm@acme.io".to_string())]
                .into_iter()
                .collect();

        assert_eq!(
            resolver.resolve(&"acme".into()).await.unwrap(),
            "warm@acme.io"
        );
        assert!(matches!(
            resolver.resolve(&"globex".into()).await,
            Err(ResolveError::UnknownTenant(tenant)) if tenant.as_str() == "globex"
        ));
    }
}
