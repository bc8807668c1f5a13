//! Fixed-window counter protocol over a key-value transport.
//!
//! Each call watches the identifier's key and runs a claim transaction
//! (`SETNX key 1`, `EXPIRE key period NX`). If the claim created the key the
//! caller opened a new window. Otherwise a second transaction (`INCR`, `TTL`)
//! counts the request and reads how long the window has left. Concurrent
//! callers are linearized by the store's transactions; nothing here locks.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, trace, warn};

use super::backend::Store;
use super::decision::Decision;
use super::key::{StorageKey, DEFAULT_PREFIX};
use super::rate::Rate;
use crate::error::{LimiterError, Result};
use crate::transport::{Connection, Transaction, Transport};

/// Expected acknowledgment of the liveness round-trip.
const PONG: &str = "PONG";

/// Reply of the claim transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClaimReply {
    created: bool,
}

impl ClaimReply {
    fn parse(reply: Option<Vec<i64>>) -> Result<Self> {
        match exact_pair(reply, "claim")? {
            (1, _) => Ok(Self { created: true }),
            (0, _) => Ok(Self { created: false }),
            (other, _) => Err(LimiterError::TransactionFailure(format!(
                "claim transaction returned SETNX reply {}",
                other
            ))),
        }
    }
}

/// Reply of the increment transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IncrementReply {
    count: u64,
    ttl: i64,
}

impl IncrementReply {
    fn parse(reply: Option<Vec<i64>>) -> Result<Self> {
        let (count, ttl) = exact_pair(reply, "increment")?;
        let count = u64::try_from(count)
            .ok()
            .filter(|count| *count > 0)
            .ok_or_else(|| {
                LimiterError::TransactionFailure(format!(
                    "increment transaction returned count {}",
                    count
                ))
            })?;
        Ok(Self { count, ttl })
    }
}

/// Unpack a two-command transaction reply, rejecting aborts and wrong arity.
fn exact_pair(reply: Option<Vec<i64>>, phase: &str) -> Result<(i64, i64)> {
    let values = reply.ok_or_else(|| {
        LimiterError::TransactionFailure(format!(
            "{} transaction aborted: watched key changed",
            phase
        ))
    })?;

    match values.as_slice() {
        [first, second] => Ok((*first, *second)),
        other => Err(LimiterError::TransactionFailure(format!(
            "{} transaction returned {} results, expected 2",
            phase,
            other.len()
        ))),
    }
}

/// Rate limit store keeping one expiring counter per identifier.
///
/// The transport is borrowed per call; the store holds no mutable state of
/// its own besides the immutable key prefix.
#[derive(Debug)]
pub struct FixedWindowStore<T: Transport> {
    transport: T,
    prefix: String,
}

impl<T: Transport> FixedWindowStore<T> {
    /// Create a store over `transport`, keying counters under `prefix`.
    ///
    /// An empty prefix falls back to `"ratelimit"`. Fails if the store does
    /// not answer the liveness check.
    pub async fn new(transport: T, prefix: &str) -> Result<Self> {
        let prefix = if prefix.is_empty() { DEFAULT_PREFIX } else { prefix };
        let store = Self {
            transport,
            prefix: prefix.to_string(),
        };

        store.ping().await?;
        info!(prefix = %store.prefix, "Window counter store ready");
        Ok(store)
    }

    /// The key prefix in use.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The storage key for `identifier`.
    pub fn key(&self, identifier: &str) -> StorageKey {
        StorageKey::new(&self.prefix, identifier)
    }

    /// Issue a trivial round-trip and require the expected acknowledgment.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.transport.acquire().await?;
        let reply = conn.ping().await?;
        if reply != PONG {
            return Err(LimiterError::UnexpectedResponse(format!(
                "expected {} from liveness check, got {:?}",
                PONG, reply
            )));
        }
        Ok(())
    }

    /// Count one request for `identifier` and decide whether it is over `rate`.
    pub async fn get(&self, identifier: &str, rate: &Rate) -> Result<Decision> {
        if identifier.is_empty() {
            return Err(LimiterError::InvalidRequest(
                "identifier must not be empty".to_string(),
            ));
        }

        let key = self.key(identifier);
        trace!(key = %key, rate = %rate, "Checking rate limit");

        let mut conn = self.transport.acquire().await?;
        let outcome = record_request(&mut conn, &key, rate).await;

        if let Err(e) = conn.unwatch().await {
            warn!(key = %key, error = %e, "Failed to release watch");
        }

        outcome
    }
}

/// Run both phases of the protocol on a checked-out connection.
async fn record_request<C: Connection>(
    conn: &mut C,
    key: &StorageKey,
    rate: &Rate,
) -> Result<Decision> {
    let key_str = key.as_str();
    conn.watch(key_str).await?;

    let claim = Transaction::new()
        .set_nx(key_str, 1)
        .expire_nx(key_str, rate.period_secs());
    let claim = ClaimReply::parse(conn.exec(&claim).await?)?;

    if claim.created {
        let now = Utc::now();
        let period_micros = i64::try_from(rate.period().as_micros()).unwrap_or(i64::MAX);
        let reset_at = now.timestamp_micros().saturating_add(period_micros) / 1_000_000;

        debug!(key = %key, reset_at = reset_at, "Opened new window");
        return Ok(Decision {
            limit: rate.limit(),
            remaining: rate.limit() - 1,
            reset_at,
            reached: false,
        });
    }

    let increment = Transaction::new().incr(key_str).ttl(key_str);
    let IncrementReply { count, ttl } = IncrementReply::parse(conn.exec(&increment).await?)?;

    let ttl = match ttl {
        ttl if ttl >= 0 => ttl,
        -1 => {
            // The window expired between the two transactions and INCR
            // recreated the key without an expiry.
            let repair = Transaction::new().expire_nx(key_str, rate.period_secs());
            conn.exec(&repair).await?.ok_or_else(|| {
                LimiterError::TransactionFailure("expiry repair aborted".to_string())
            })?;
            debug!(key = %key, "Restored expiry on recreated window");
            rate.period_secs() as i64
        }
        other => {
            return Err(LimiterError::TransactionFailure(format!(
                "increment transaction returned TTL {}",
                other
            )))
        }
    };

    let remaining = rate.limit().saturating_sub(count);
    let reached = count > rate.limit();
    if reached {
        debug!(key = %key, count = count, limit = rate.limit(), "Rate limit exceeded");
    }

    Ok(Decision {
        limit: rate.limit(),
        remaining,
        reset_at: Utc::now().timestamp() + ttl,
        reached,
    })
}

#[async_trait]
impl<T: Transport> Store for FixedWindowStore<T> {
    async fn get(&self, identifier: &str, rate: &Rate) -> Result<Decision> {
        FixedWindowStore::get(self, identifier, rate).await
    }
}
