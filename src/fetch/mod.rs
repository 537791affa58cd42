use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::FetchError;

pub mod budget;
pub mod decode;
pub mod fetcher;
pub mod provider;
pub mod request;

pub use budget::FetchBudget;
pub use fetcher::RateLimitedFetcher;
pub use provider::{AlphaVantageProvider, RateProvider};

pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Which path produced a sample, surfaced so degraded data is never passed off as live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Live,
    Cached,
    Simulated,
}

impl DataSource {
    pub fn label(&self) -> &'static str {
        match self {
            DataSource::Live => "Alpha Vantage",
            DataSource::Cached => "Cached",
            DataSource::Simulated => "Simulated (Fallback)",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One exchange-rate observation, fetched, cached or synthetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    pub value: f64,
    pub observed_at: DateTime<Utc>,
    pub source: DataSource,
}

impl RateSample {
    pub fn new(value: f64, observed_at: DateTime<Utc>, source: DataSource) -> Self {
        Self {
            value,
            observed_at,
            source,
        }
    }
}
