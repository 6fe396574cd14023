//! Recipient address screening.

use ahash::AHashSet;

/// Accepts or rejects a recipient before anything else happens to an event.
pub trait Validator: Send + Sync + std::fmt::Debug {
    fn is_valid(&self, address: &str) -> bool;
}

/// Rejects malformed addresses and addresses at throwaway-mailbox domains.
///
/// An address is well formed here if it has exactly one `@`. Domains are
/// compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct DisposableDomainValidator {
    domains: AHashSet<String>,
}

impl DisposableDomainValidator {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|domain| domain.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl Validator for DisposableDomainValidator {
    fn is_valid(&self, address: &str) -> bool {
        let mut parts = address.split('@');
        let (Some(_), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return false;
        };

        !self.domains.contains(&domain.to_ascii_lowercase())
    }
}
