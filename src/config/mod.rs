use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub mod loader;
pub mod validator;

pub use loader::{load_settings, load_settings_with, RawSettings};
pub use validator::{classify_api_key, validate_settings, KeyStatus};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
pub const DEFAULT_REQUEST_CEILING: u32 = 20;
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const MAX_RETRIES: u32 = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(180);
pub const DEFAULT_BASE_PRICE: f64 = 1.1659;
pub const DEFAULT_PRICE_FLOOR: f64 = 1.1500;
pub const DEFAULT_PRICE_CEILING: f64 = 1.1800;
pub const DEFAULT_MAX_MOVE: f64 = 0.0003;
pub const DEFAULT_DRIFT: f64 = 0.00001;
pub const DEFAULT_OFF_SESSION_MULTIPLIER: f64 = 0.7;
pub const DEFAULT_CACHE_DIR: &str = ".fx-feed";
pub const DEFAULT_HISTORY_LEN: usize = 50;
pub const MAX_HISTORY_LEN: usize = 10_000;

/// Deployment mode. Governs how strictly the provider credentials are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(AppError::config(format!(
                "unknown environment `{other}`, expected development, production or test"
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        };
        f.write_str(name)
    }
}

/// The single instrument a process tracks, e.g. `EUR/USD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

impl CurrencyPair {
    /// Key under which the cached rate for this pair is persisted.
    pub fn cache_key(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl Default for CurrencyPair {
    fn default() -> Self {
        Self {
            base: "EUR".to_string(),
            quote: "USD".to_string(),
        }
    }
}

impl FromStr for CurrencyPair {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let cleaned: String = value
            .trim()
            .chars()
            .filter(|c| !matches!(c, '/' | '-' | '_' | ' '))
            .collect();

        if cleaned.len() != 6 || !cleaned.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AppError::config(format!(
                "currency pair `{value}` must look like EUR/USD"
            )));
        }

        let upper = cleaned.to_ascii_uppercase();
        Ok(Self {
            base: upper[..3].to_string(),
            quote: upper[3..].to_string(),
        })
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// UTC hour range (inclusive on both ends) with its volatility multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBand {
    #[serde(default)]
    pub label: Option<String>,
    pub start_hour: u32,
    pub end_hour: u32,
    pub multiplier: f64,
}

impl SessionBand {
    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour <= self.end_hour
    }
}

pub fn default_session_bands() -> Vec<SessionBand> {
    vec![
        SessionBand {
            label: Some("london".to_string()),
            start_hour: 8,
            end_hour: 16,
            multiplier: 1.5,
        },
        SessionBand {
            label: Some("new_york".to_string()),
            start_hour: 13,
            end_hour: 21,
            multiplier: 1.3,
        },
    ]
}

/// Delay before retry number `retry` (1-based): `retry_delay * 2^(retry - 1)`.
pub fn retry_backoff(retry_delay: Duration, retry: u32) -> Duration {
    retry_delay.saturating_mul(2_u32.saturating_pow(retry.saturating_sub(1)))
}

/// Time one request may take in the worst case: the first attempt and every
/// retry timing out, plus the exponential backoff between them.
pub fn call_deadline(timeout: Duration, max_retries: u32, retry_delay: Duration) -> Duration {
    let attempts = max_retries.saturating_add(1);
    // The backoff multiplier saturates from retry 33 on, so later terms are all equal.
    let doubling = max_retries.min(32);
    let total = (1..=doubling).fold(timeout.saturating_mul(attempts), |total, retry| {
        total.saturating_add(retry_backoff(retry_delay, retry))
    });
    total.saturating_add(
        retry_backoff(retry_delay, 33).saturating_mul(max_retries - doubling),
    )
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchPolicy {
    pub request_ceiling: u32,
    pub min_interval: Duration,
    /// `None` counts the ceiling over the whole process lifetime.
    pub quota_window: Option<Duration>,
    pub staleness: Duration,
    /// Upper bound on one remote attempt, retries included.
    pub call_deadline: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            request_ceiling: DEFAULT_REQUEST_CEILING,
            min_interval: DEFAULT_MIN_INTERVAL,
            quota_window: None,
            staleness: DEFAULT_STALENESS,
            call_deadline: call_deadline(DEFAULT_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub base_price: f64,
    pub floor: f64,
    pub ceiling: f64,
    pub base_max_move: f64,
    pub drift: f64,
    pub sessions: Vec<SessionBand>,
    pub off_session_multiplier: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            base_price: DEFAULT_BASE_PRICE,
            floor: DEFAULT_PRICE_FLOOR,
            ceiling: DEFAULT_PRICE_CEILING,
            base_max_move: DEFAULT_MAX_MOVE,
            drift: DEFAULT_DRIFT,
            sessions: default_session_bands(),
            off_session_multiplier: DEFAULT_OFF_SESSION_MULTIPLIER,
        }
    }
}

/// Fully resolved configuration, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub pair: CurrencyPair,
    pub provider: ProviderSettings,
    pub policy: FetchPolicy,
    pub synthetic: SyntheticConfig,
    pub refresh_interval: Duration,
    pub cache_dir: PathBuf,
    pub history_len: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            pair: CurrencyPair::default(),
            provider: ProviderSettings {
                api_key: None,
                base_url: DEFAULT_BASE_URL.to_string(),
                timeout: DEFAULT_TIMEOUT,
                max_retries: DEFAULT_MAX_RETRIES,
                retry_delay: DEFAULT_RETRY_DELAY,
            },
            policy: FetchPolicy::default(),
            synthetic: SyntheticConfig::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            history_len: DEFAULT_HISTORY_LEN,
        }
    }
}

impl Settings {
    /// Secret-free view of the settings, safe to log or print.
    pub fn summary(&self) -> SettingsSummary {
        let key_status = classify_api_key(self.provider.api_key.as_deref());
        SettingsSummary {
            environment: self.environment,
            pair: self.pair.to_string(),
            base_url: self.provider.base_url.clone(),
            has_api_key: key_status != KeyStatus::Missing,
            key_status,
            request_ceiling: self.policy.request_ceiling,
            min_interval_secs: self.policy.min_interval.as_secs(),
            quota_window_secs: self.policy.quota_window.map(|window| window.as_secs()),
            staleness_secs: self.policy.staleness.as_secs(),
            timeout_ms: self.provider.timeout.as_millis() as u64,
            refresh_secs: self.refresh_interval.as_secs(),
            price_band: [self.synthetic.floor, self.synthetic.ceiling],
            cache_dir: self.cache_dir.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsSummary {
    pub environment: Environment,
    pub pair: String,
    pub base_url: String,
    pub has_api_key: bool,
    pub key_status: KeyStatus,
    pub request_ceiling: u32,
    pub min_interval_secs: u64,
    pub quota_window_secs: Option<u64>,
    pub staleness_secs: u64,
    pub timeout_ms: u64,
    pub refresh_secs: u64,
    pub price_band: [f64; 2],
    pub cache_dir: String,
}
