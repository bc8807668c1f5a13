//! Key-value transport contract used by the window counter.
//!
//! A [`Transport`] hands out pooled [`Connection`]s. A connection supports a
//! liveness round-trip, watching a key, and executing a [`Transaction`]
//! atomically. Connections go back to their pool when dropped, so every exit
//! path of a caller releases them.

mod memory;
mod redis;

pub use self::memory::MemoryTransport;
pub use self::redis::RedisTransport;

use async_trait::async_trait;

use crate::error::Result;

/// A single command queued inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set `key` to `value` only if it does not exist. Replies 1 or 0.
    SetNx { key: String, value: i64 },
    /// Set the expiry of `key` only if it has none (`EXPIRE .. NX`).
    /// Replies 1 if the expiry was set, 0 if the key is absent or already expires.
    ExpireNx { key: String, seconds: u64 },
    /// Increment `key`, creating it at 0 first if absent. Replies the new value.
    Incr { key: String },
    /// Remaining time to live of `key` in seconds, -1 without expiry, -2 if absent.
    Ttl { key: String },
}

/// An ordered batch of commands that either all apply or none do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    commands: Vec<Command>,
}

impl Transaction {
    /// Create an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_nx(mut self, key: &str, value: i64) -> Self {
        self.commands.push(Command::SetNx {
            key: key.to_string(),
            value,
        });
        self
    }

    pub fn expire_nx(mut self, key: &str, seconds: u64) -> Self {
        self.commands.push(Command::ExpireNx {
            key: key.to_string(),
            seconds,
        });
        self
    }

    pub fn incr(mut self, key: &str) -> Self {
        self.commands.push(Command::Incr {
            key: key.to_string(),
        });
        self
    }

    pub fn ttl(mut self, key: &str) -> Self {
        self.commands.push(Command::Ttl {
            key: key.to_string(),
        });
        self
    }

    /// The queued commands, in execution order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// A source of pooled store connections.
///
/// The pool lifecycle is owned by whoever built the transport; consumers only
/// borrow connections for the duration of one call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connection type handed out by this transport.
    type Conn: Connection;

    /// Check a connection out of the pool.
    async fn acquire(&self) -> Result<Self::Conn>;
}

/// A checked-out store connection.
#[async_trait]
pub trait Connection: Send {
    /// Trivial round-trip, returning the store's raw acknowledgment.
    async fn ping(&mut self) -> Result<String>;

    /// Abort the next transaction on this connection if `key` changes first.
    async fn watch(&mut self, key: &str) -> Result<()>;

    /// Drop every watch held by this connection.
    async fn unwatch(&mut self) -> Result<()>;

    /// Execute `txn` atomically.
    ///
    /// Returns `Ok(None)` when a watched key changed and nothing was applied,
    /// otherwise one integer reply per queued command.
    async fn exec(&mut self, txn: &Transaction) -> Result<Option<Vec<i64>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_preserves_order() {
        let txn = Transaction::new().set_nx("k", 1).expire_nx("k", 60);

        assert_eq!(txn.len(), 2);
        assert_eq!(
            txn.commands(),
            &[
                Command::SetNx {
                    key: "k".to_string(),
                    value: 1
                },
                Command::ExpireNx {
                    key: "k".to_string(),
                    seconds: 60
                },
            ]
        );
    }

    #[test]
    fn test_empty_transaction() {
        let txn = Transaction::new();
        assert!(txn.is_empty());
        assert_eq!(txn.len(), 0);
    }
}
