//! Limiter binding a single rate to a counter store.

use tracing::debug;

use super::backend::Store;
use super::decision::Decision;
use super::rate::Rate;
use crate::error::Result;

/// A rate limiter enforcing one [`Rate`] through a [`Store`].
///
/// This struct is thread-safe and can be shared across multiple tasks; wrap
/// the store in an `Arc` to share it between limiters with different rates.
pub struct Limiter<S: Store> {
    /// Counter store shared with other processes
    store: S,
    /// Rate applied to every identifier
    rate: Rate,
}

impl<S: Store> Limiter<S> {
    /// Create a limiter applying `rate` through `store`.
    pub fn new(store: S, rate: Rate) -> Self {
        debug!(rate = %rate, "Creating limiter");
        Self { store, rate }
    }

    /// Count one request for `identifier` and return the decision.
    pub async fn get(&self, identifier: &str) -> Result<Decision> {
        self.store.get(identifier, &self.rate).await
    }

    /// The configured rate.
    pub fn rate(&self) -> &Rate {
        &self.rate
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::ratelimit::FixedWindowStore;
    use crate::transport::MemoryTransport;

    #[tokio::test]
    async fn test_limiter_applies_its_rate() {
        let store = FixedWindowStore::new(MemoryTransport::new(), "api")
            .await
            .unwrap();
        let limiter = Limiter::new(store, Rate::per_minute(2).unwrap());

        assert_eq!(limiter.get("client").await.unwrap().remaining, 1);
        assert_eq!(limiter.get("client").await.unwrap().remaining, 0);

        let decision = limiter.get("client").await.unwrap();
        assert!(decision.reached);
        assert_eq!(decision.limit, 2);
    }

    #[tokio::test]
    async fn test_limiters_share_a_store() {
        let store = Arc::new(
            FixedWindowStore::new(MemoryTransport::new(), "api")
                .await
                .unwrap(),
        );
        let strict = Limiter::new(Arc::clone(&store), Rate::per_minute(1).unwrap());
        let lenient = Limiter::new(Arc::clone(&store), Rate::per_minute(100).unwrap());

        // Both limiters count against the same key.
        assert!(!strict.get("shared").await.unwrap().reached);
        assert_eq!(lenient.get("shared").await.unwrap().remaining, 98);
        assert!(strict.get("shared").await.unwrap().reached);
    }

    #[tokio::test]
    async fn test_limiter_exposes_rate() {
        let store = FixedWindowStore::new(MemoryTransport::new(), "")
            .await
            .unwrap();
        let limiter = Limiter::new(store, "30-S".parse().unwrap());

        assert_eq!(limiter.rate().limit(), 30);
        assert_eq!(limiter.store().prefix(), "ratelimit");
    }
}
