use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod rate_cache;

pub use rate_cache::{JsonFileStore, MemoryStore};

/// The single persisted observation per instrument: `{ "rate": .., "timestamp": .. }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CachedRate {
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
}

/// Single-slot key-value persistence for the last good rate.
pub trait RateStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<CachedRate>>;

    /// Overwrite whatever is stored under `key`.
    fn save(&self, key: &str, rate: &CachedRate) -> Result<()>;
}
