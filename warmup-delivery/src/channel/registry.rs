//! Tenant to delivery channel mapping.

use std::sync::Arc;

use ahash::AHashMap;
use warmup_common::TenantId;

use super::{ChannelKind, ChannelSettings, DeliveryChannel};
use crate::error::ChannelError;

#[derive(Debug, Clone)]
enum Slot {
    Ready(Arc<dyn DeliveryChannel>),
    Unsupported(ChannelKind),
}

/// Which channel each tenant sends through.
///
/// Tenants sharing a channel kind share one channel instance.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    tenants: AHashMap<TenantId, Slot>,
}

impl ChannelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one channel per kind referenced in `mapping`.
    ///
    /// Kinds without an implementation (`outlook`) are accepted here and fail
    /// at selection time, so only the affected tenant's events are redelivered.
    ///
    /// # Errors
    /// If a referenced kind is missing its settings, or was not compiled in.
    pub fn build(
        mapping: &AHashMap<TenantId, ChannelKind>,
        settings: &ChannelSettings,
    ) -> Result<Self, ChannelError> {
        let mut built: AHashMap<ChannelKind, Arc<dyn DeliveryChannel>> = AHashMap::default();
        let mut registry = Self::new();

        for (tenant, &kind) in mapping {
            if kind == ChannelKind::Outlook {
                registry.insert_unsupported(tenant.clone(), kind);
                continue;
            }

            let channel = if let Some(channel) = built.get(&kind) {
                Arc::clone(channel)
            } else {
                let channel = create(kind, settings)?;
                built.insert(kind, Arc::clone(&channel));
                channel
            };

            registry.insert(tenant.clone(), channel);
        }

        Ok(registry)
    }

    pub fn insert(&mut self, tenant: TenantId, channel: Arc<dyn DeliveryChannel>) {
        self.tenants.insert(tenant, Slot::Ready(channel));
    }

    /// Map `tenant` to a kind that has no implementation.
    pub fn insert_unsupported(&mut self, tenant: TenantId, kind: ChannelKind) {
        self.tenants.insert(tenant, Slot::Unsupported(kind));
    }

    /// The channel `tenant` sends through.
    ///
    /// # Errors
    /// If the tenant has no mapping, or is mapped to an unsupported kind.
    pub fn select(&self, tenant: &TenantId) -> Result<Arc<dyn DeliveryChannel>, ChannelError> {
        match self.tenants.get(tenant) {
            Some(Slot::Ready(channel)) => Ok(Arc::clone(channel)),
            Some(Slot::Unsupported(kind)) => Err(ChannelError::Unsupported(*kind)),
            None => Err(ChannelError::NoChannel(tenant.clone())),
        }
    }

    /// Every tenant with a channel mapping, in sorted order.
    #[must_use]
    pub fn tenants(&self) -> Vec<TenantId> {
        let mut tenants: Vec<TenantId> = self.tenants.keys().cloned().collect();
        tenants.sort_unstable();
        tenants
    }

    #[must_use]
    pub fn contains(&self, tenant: &TenantId) -> bool {
        self.tenants.contains_key(tenant)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

#[allow(
    unused_variables,
    reason = "settings is unused when no channel features are enabled"
)]
fn create(
    kind: ChannelKind,
    settings: &ChannelSettings,
) -> Result<Arc<dyn DeliveryChannel>, ChannelError> {
    match kind {
        #[cfg(feature = "smtp")]
        ChannelKind::Smtp => {
            let config = settings.smtp.as_ref().ok_or_else(|| {
                ChannelError::Configuration(
                    "a tenant uses smtp but no smtp settings are configured".to_string(),
                )
            })?;
            Ok(Arc::new(super::smtp::SmtpChannel::new(config)?))
        }
        #[cfg(feature = "gmail")]
        ChannelKind::Gmail => {
            let config = settings.gmail.clone().ok_or_else(|| {
                ChannelError::Configuration(
                    "a tenant uses gmail but no gmail settings are configured".to_string(),
                )
            })?;
            Ok(Arc::new(super::gmail::GmailChannel::new(config)?))
        }
        ChannelKind::Outlook => Err(ChannelError::Unsupported(kind)),
        #[allow(unreachable_patterns, reason = "Reachable when a channel feature is disabled")]
        other => Err(ChannelError::Configuration(format!(
            "{other} support is not compiled in"
        ))),
    }
}
