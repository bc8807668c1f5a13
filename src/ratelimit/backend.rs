//! Store trait for abstracting over rate limit counter implementations.

use std::sync::Arc;

use async_trait::async_trait;

use super::decision::Decision;
use super::rate::Rate;
use crate::error::Result;

/// Trait for rate limit stores.
///
/// This lets a [`Limiter`](super::Limiter) work with any counter store,
/// whether it is backed by Redis, the in-memory transport, or a test double.
#[async_trait]
pub trait Store: Send + Sync {
    /// Count one request for `identifier` against `rate`.
    async fn get(&self, identifier: &str, rate: &Rate) -> Result<Decision>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn get(&self, identifier: &str, rate: &Rate) -> Result<Decision> {
        (**self).get(identifier, rate).await
    }
}
