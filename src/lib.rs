//! Ratewindow - Fixed-Window Rate Limit Counters
//!
//! This crate answers one question per call: has an identifier exceeded its
//! request budget for the current fixed window, and if not, how much remains
//! and when does the window reset. Counters live in a shared key-value store
//! with expiring keys, so any number of processes can enforce the same limit.
//! Correctness under concurrent callers comes from the store's optimistic
//! transactions, not from any in-process lock.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod transport;

pub use error::{LimiterError, Result};
pub use ratelimit::{Decision, FixedWindowStore, Limiter, Rate, Store, StorageKey};
