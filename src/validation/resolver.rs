use super::dnsmx::{MxLookup, ResolveFault};
use super::providers::{FreeProviderSet, normalize_domain};
use crate::cache::DomainCache;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Decides whether a domain can receive mail.
///
/// Checks, in order: the free-provider whitelist (no DNS, no cache entry),
/// the per-run [`DomainCache`], and finally the [`MxLookup`] backend. Only one
/// backend query is ever in flight per domain; concurrent callers share it.
pub struct MxResolver<L> {
    lookup: L,
    providers: FreeProviderSet,
    cache: Arc<DomainCache>,
}

impl<L: MxLookup> MxResolver<L> {
    pub fn new(lookup: L, providers: FreeProviderSet) -> Self {
        Self::with_cache(lookup, providers, Arc::new(DomainCache::new()))
    }

    /// Shares an existing cache, e.g. to reuse answers across runs.
    pub fn with_cache(lookup: L, providers: FreeProviderSet, cache: Arc<DomainCache>) -> Self {
        Self {
            lookup,
            providers,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<DomainCache> {
        &self.cache
    }

    pub fn providers(&self) -> &FreeProviderSet {
        &self.providers
    }

    /// # Returns
    /// - `Ok(true)` if the domain is whitelisted or publishes MX records
    /// - `Ok(false)` if it does not exist or publishes none
    /// - `Err` if the lookup failed; the failure is cached like an answer
    pub async fn resolve(&self, domain: &str) -> Result<bool, ResolveFault> {
        let domain = normalize_domain(domain);
        if self.providers.contains(&domain) {
            trace!(domain = %domain, "free provider, skipping MX lookup");
            return Ok(true);
        }

        self.cache
            .get_or_resolve(&domain, || async {
                debug!(domain = %domain, "looking up MX records");
                let outcome = self.lookup.has_mx(&domain).await;
                if let Err(fault) = &outcome {
                    warn!(domain = %domain, error = %fault, "MX lookup failed");
                }
                outcome
            })
            .await
    }
}
