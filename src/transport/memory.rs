//! In-process transport with expiring keys and watch-based transactions.
//!
//! This mirrors the subset of Redis semantics the window counter relies on:
//! every write bumps a per-key version, `WATCH` remembers the version it saw,
//! and `EXEC` applies nothing if any watched version moved. Expiry is checked
//! lazily against `tokio::time::Instant`, so paused test clocks drive it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use super::{Command, Connection, Transaction, Transport};
use crate::error::Result;

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
    versions: HashMap<String, u64>,
}

impl Keyspace {
    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn touch(&mut self, key: &str) {
        *self.versions.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Drop `key` if its expiry has passed. Expiry counts as a modification.
    fn purge(&mut self, key: &str, now: Instant) {
        let expired = self
            .entries
            .get(key)
            .and_then(|e| e.expires_at)
            .is_some_and(|at| at <= now);

        if expired {
            self.entries.remove(key);
            self.touch(key);
            trace!(key = %key, "Key expired");
        }
    }

    fn apply(&mut self, command: &Command, now: Instant) -> i64 {
        match command {
            Command::SetNx { key, value } => {
                self.purge(key, now);
                if self.entries.contains_key(key) {
                    return 0;
                }
                self.entries.insert(
                    key.clone(),
                    Entry {
                        value: *value,
                        expires_at: None,
                    },
                );
                self.touch(key);
                1
            }
            Command::ExpireNx { key, seconds } => {
                self.purge(key, now);
                let Some(entry) = self.entries.get_mut(key) else {
                    return 0;
                };
                if entry.expires_at.is_some() {
                    return 0;
                }
                entry.expires_at = Some(now + Duration::from_secs(*seconds));
                self.touch(key);
                1
            }
            Command::Incr { key } => {
                self.purge(key, now);
                let entry = self.entries.entry(key.clone()).or_insert(Entry {
                    value: 0,
                    expires_at: None,
                });
                entry.value += 1;
                let value = entry.value;
                self.touch(key);
                value
            }
            Command::Ttl { key } => {
                self.purge(key, now);
                match self.entries.get(key) {
                    None => -2,
                    Some(Entry {
                        expires_at: None, ..
                    }) => -1,
                    Some(Entry {
                        expires_at: Some(at),
                        ..
                    }) => {
                        // Same rounding as Redis: nearest whole second.
                        let millis = at.saturating_duration_since(now).as_millis() as i64;
                        (millis + 500) / 1000
                    }
                }
            }
        }
    }
}

/// Shared in-memory keyspace. Clones see the same keys.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    keyspace: Arc<Mutex<Keyspace>>,
}

impl MemoryTransport {
    /// Create an empty keyspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `key` directly, as another client would.
    pub fn insert(&self, key: &str, value: i64, ttl: Option<Duration>) {
        let now = Instant::now();
        let mut keyspace = self.keyspace.lock();
        keyspace.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );
        keyspace.touch(key);
    }

    /// Current value of `key`, if it exists and has not expired.
    pub fn value(&self, key: &str) -> Option<i64> {
        let mut keyspace = self.keyspace.lock();
        keyspace.purge(key, Instant::now());
        keyspace.entries.get(key).map(|e| e.value)
    }

    /// Time left before `key` expires. `None` if absent or without expiry.
    pub fn time_to_live(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let mut keyspace = self.keyspace.lock();
        keyspace.purge(key, now);
        keyspace
            .entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Conn = MemoryConnection;

    async fn acquire(&self) -> Result<MemoryConnection> {
        Ok(MemoryConnection {
            keyspace: Arc::clone(&self.keyspace),
            watched: Vec::new(),
        })
    }
}

/// A connection to a [`MemoryTransport`] keyspace.
#[derive(Debug)]
pub struct MemoryConnection {
    keyspace: Arc<Mutex<Keyspace>>,
    watched: Vec<(String, u64)>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn ping(&mut self) -> Result<String> {
        Ok("PONG".to_string())
    }

    async fn watch(&mut self, key: &str) -> Result<()> {
        let mut keyspace = self.keyspace.lock();
        keyspace.purge(key, Instant::now());
        self.watched.push((key.to_string(), keyspace.version(key)));
        Ok(())
    }

    async fn unwatch(&mut self) -> Result<()> {
        self.watched.clear();
        Ok(())
    }

    async fn exec(&mut self, txn: &Transaction) -> Result<Option<Vec<i64>>> {
        let now = Instant::now();
        let mut keyspace = self.keyspace.lock();

        // EXEC always releases the watches, whether or not it applies.
        let watched = std::mem::take(&mut self.watched);
        for (key, _) in &watched {
            keyspace.purge(key, now);
        }
        if let Some((key, _)) = watched
            .iter()
            .find(|(key, seen)| keyspace.version(key) != *seen)
        {
            trace!(key = %key, "Watched key changed, aborting transaction");
            return Ok(None);
        }

        let values = txn
            .commands()
            .iter()
            .map(|command| keyspace.apply(command, now))
            .collect();
        Ok(Some(values))
    }
}
