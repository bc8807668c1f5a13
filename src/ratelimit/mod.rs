//! Fixed-window rate limiting over a shared key-value store.

mod backend;
mod decision;
mod key;
mod limiter;
mod rate;
mod store;

pub use backend::Store;
pub use decision::Decision;
pub use key::{StorageKey, DEFAULT_PREFIX};
pub use limiter::Limiter;
pub use rate::Rate;
pub use store::FixedWindowStore;
