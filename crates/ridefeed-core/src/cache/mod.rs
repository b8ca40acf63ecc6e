//! In-memory feed cache.
//!
//! This module provides the `CacheStore` that keeps recently fetched feed
//! pages keyed by (domain, canonical params). Entries expire lazily after a
//! TTL and the oldest entry is evicted once the store exceeds its bound.
//! Nothing is persisted; the cache is rebuilt on every launch.

pub mod clock;
pub mod key;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::CacheKey;
pub use store::{CacheConfig, CacheEntry, CacheStore};
