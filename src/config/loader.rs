use std::{
    fmt::Display,
    fs,
    io,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use log::debug;
use serde::Deserialize;

use crate::error::{AppError, Context, Result};

use super::{
    validator, CurrencyPair, Environment, FetchPolicy, ProviderSettings, SessionBand, Settings,
    SyntheticConfig, DEFAULT_BASE_PRICE, DEFAULT_BASE_URL, DEFAULT_CACHE_DIR, DEFAULT_DRIFT,
    DEFAULT_HISTORY_LEN, DEFAULT_MAX_MOVE, DEFAULT_MAX_RETRIES, DEFAULT_MIN_INTERVAL,
    DEFAULT_OFF_SESSION_MULTIPLIER, DEFAULT_PRICE_CEILING, DEFAULT_PRICE_FLOOR,
    DEFAULT_REFRESH_INTERVAL, DEFAULT_REQUEST_CEILING, DEFAULT_RETRY_DELAY, DEFAULT_STALENESS,
    DEFAULT_TIMEOUT,
};

/// One configuration layer. Every field is optional so layers can be stacked:
/// explicit overrides, then the environment, then the settings file, then defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    pub environment: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub pair: Option<String>,
    pub request_ceiling: Option<u32>,
    pub min_interval_secs: Option<u64>,
    pub quota_window_secs: Option<u64>,
    pub staleness_secs: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub refresh_secs: Option<u64>,
    pub base_price: Option<f64>,
    pub price_floor: Option<f64>,
    pub price_ceiling: Option<f64>,
    pub max_move: Option<f64>,
    pub drift: Option<f64>,
    pub off_session_multiplier: Option<f64>,
    pub sessions: Option<Vec<SessionBand>>,
    pub cache_dir: Option<String>,
    pub history: Option<usize>,
}

impl RawSettings {
    /// Read the layer from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the environment layer from an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Ok(Self {
            environment: get("FX_FEED_ENV"),
            api_key: get("ALPHA_VANTAGE_API_KEY"),
            base_url: get("ALPHA_VANTAGE_API_URL"),
            pair: get("FX_FEED_PAIR"),
            request_ceiling: parse_var("FX_FEED_REQUEST_CEILING", get("FX_FEED_REQUEST_CEILING"))?,
            min_interval_secs: parse_var(
                "FX_FEED_MIN_INTERVAL_SECS",
                get("FX_FEED_MIN_INTERVAL_SECS"),
            )?,
            quota_window_secs: parse_var(
                "FX_FEED_QUOTA_WINDOW_SECS",
                get("FX_FEED_QUOTA_WINDOW_SECS"),
            )?,
            staleness_secs: parse_var("FX_FEED_STALENESS_SECS", get("FX_FEED_STALENESS_SECS"))?,
            timeout_ms: parse_var("FX_FEED_TIMEOUT_MS", get("FX_FEED_TIMEOUT_MS"))?,
            max_retries: parse_var("FX_FEED_MAX_RETRIES", get("FX_FEED_MAX_RETRIES"))?,
            retry_delay_ms: parse_var("FX_FEED_RETRY_DELAY_MS", get("FX_FEED_RETRY_DELAY_MS"))?,
            refresh_secs: parse_var("FX_FEED_REFRESH_SECS", get("FX_FEED_REFRESH_SECS"))?,
            base_price: parse_var("FX_FEED_BASE_PRICE", get("FX_FEED_BASE_PRICE"))?,
            price_floor: parse_var("FX_FEED_PRICE_FLOOR", get("FX_FEED_PRICE_FLOOR"))?,
            price_ceiling: parse_var("FX_FEED_PRICE_CEILING", get("FX_FEED_PRICE_CEILING"))?,
            max_move: parse_var("FX_FEED_MAX_MOVE", get("FX_FEED_MAX_MOVE"))?,
            drift: parse_var("FX_FEED_DRIFT", get("FX_FEED_DRIFT"))?,
            off_session_multiplier: None,
            sessions: None,
            cache_dir: get("FX_FEED_CACHE_DIR"),
            history: parse_var("FX_FEED_HISTORY", get("FX_FEED_HISTORY"))?,
        })
    }

    /// Read the persisted settings file. A missing file is an empty layer, not an error.
    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("No settings file at {}, skipping", path.display());
                return Ok(None);
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read settings file {}", path.display()))
                    .map_err(AppError::from);
            }
        };

        let raw: RawSettings = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse settings file {}", path.display()))?;
        Ok(Some(raw))
    }

    /// Merge two layers; values present in `self` win over `lower`.
    pub fn layered_over(self, lower: RawSettings) -> RawSettings {
        RawSettings {
            environment: self.environment.or(lower.environment),
            api_key: self.api_key.or(lower.api_key),
            base_url: self.base_url.or(lower.base_url),
            pair: self.pair.or(lower.pair),
            request_ceiling: self.request_ceiling.or(lower.request_ceiling),
            min_interval_secs: self.min_interval_secs.or(lower.min_interval_secs),
            quota_window_secs: self.quota_window_secs.or(lower.quota_window_secs),
            staleness_secs: self.staleness_secs.or(lower.staleness_secs),
            timeout_ms: self.timeout_ms.or(lower.timeout_ms),
            max_retries: self.max_retries.or(lower.max_retries),
            retry_delay_ms: self.retry_delay_ms.or(lower.retry_delay_ms),
            refresh_secs: self.refresh_secs.or(lower.refresh_secs),
            base_price: self.base_price.or(lower.base_price),
            price_floor: self.price_floor.or(lower.price_floor),
            price_ceiling: self.price_ceiling.or(lower.price_ceiling),
            max_move: self.max_move.or(lower.max_move),
            drift: self.drift.or(lower.drift),
            off_session_multiplier: self.off_session_multiplier.or(lower.off_session_multiplier),
            sessions: self.sessions.or(lower.sessions),
            cache_dir: self.cache_dir.or(lower.cache_dir),
            history: self.history.or(lower.history),
        }
    }

    /// Fill the gaps with documented defaults and resolve typed values.
    pub fn into_settings(self) -> Result<Settings> {
        let environment = match self.environment.as_deref() {
            Some(value) => value.parse::<Environment>()?,
            None => Environment::default(),
        };

        let pair = match self.pair.as_deref() {
            Some(value) => value.parse::<CurrencyPair>()?,
            None => CurrencyPair::default(),
        };

        let timeout = self
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        let api_key = self
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let max_retries = self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        let retry_delay = self
            .retry_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RETRY_DELAY);

        Ok(Settings {
            environment,
            pair,
            provider: ProviderSettings {
                api_key,
                base_url: self
                    .base_url
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                timeout,
                max_retries,
                retry_delay,
            },
            policy: FetchPolicy {
                request_ceiling: self.request_ceiling.unwrap_or(DEFAULT_REQUEST_CEILING),
                min_interval: self
                    .min_interval_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_MIN_INTERVAL),
                quota_window: self.quota_window_secs.map(Duration::from_secs),
                staleness: self
                    .staleness_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_STALENESS),
                call_deadline: super::call_deadline(timeout, max_retries, retry_delay),
            },
            synthetic: SyntheticConfig {
                base_price: self.base_price.unwrap_or(DEFAULT_BASE_PRICE),
                floor: self.price_floor.unwrap_or(DEFAULT_PRICE_FLOOR),
                ceiling: self.price_ceiling.unwrap_or(DEFAULT_PRICE_CEILING),
                base_max_move: self.max_move.unwrap_or(DEFAULT_MAX_MOVE),
                drift: self.drift.unwrap_or(DEFAULT_DRIFT),
                sessions: self.sessions.unwrap_or_else(super::default_session_bands),
                off_session_multiplier: self
                    .off_session_multiplier
                    .unwrap_or(DEFAULT_OFF_SESSION_MULTIPLIER),
            },
            refresh_interval: self
                .refresh_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REFRESH_INTERVAL),
            cache_dir: PathBuf::from(
                self.cache_dir
                    .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string()),
            ),
            history_len: self.history.unwrap_or(DEFAULT_HISTORY_LEN),
        })
    }
}

/// Resolve settings from overrides, the process environment and the settings file.
pub fn load_settings(overrides: RawSettings, settings_file: &Path) -> Result<Settings> {
    let environment = RawSettings::from_env()?;
    load_settings_with(overrides, environment, settings_file)
}

/// Same as [`load_settings`] with an explicit environment layer.
pub fn load_settings_with(
    overrides: RawSettings,
    environment: RawSettings,
    settings_file: &Path,
) -> Result<Settings> {
    let persisted = RawSettings::from_file(settings_file)?.unwrap_or_default();

    let settings = overrides
        .layered_over(environment)
        .layered_over(persisted)
        .into_settings()?;

    validator::validate_settings(&settings)?;

    Ok(settings)
}

fn parse_var<T>(key: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match value {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|err| {
            AppError::config(format!("invalid value `{raw}` for {key}: {err}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn write_settings_file(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join("fx-feed.json");
        let mut file = fs::File::create(&path).expect("create settings file");
        file.write_all(json.as_bytes()).expect("write settings file");
        path
    }

    #[test]
    fn defaults_apply_when_every_layer_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_with(
            RawSettings::default(),
            RawSettings::default(),
            &dir.path().join("missing.json"),
        )
        .expect("defaults are valid");

        assert_eq!(settings.environment, Environment::Development);
        assert_eq!(settings.policy.request_ceiling, DEFAULT_REQUEST_CEILING);
        assert_eq!(settings.policy.min_interval, DEFAULT_MIN_INTERVAL);
        assert_eq!(settings.policy.quota_window, None);
        assert_eq!(settings.synthetic.base_price, DEFAULT_BASE_PRICE);
        assert_eq!(settings.provider.base_url, DEFAULT_BASE_URL);
        assert!(settings.provider.api_key.is_none());
    }

    #[test]
    fn precedence_is_override_then_env_then_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_settings_file(
            dir.path(),
            r#"{ "request_ceiling": 7, "min_interval_secs": 120, "base_price": 1.16, "history": 10 }"#,
        );

        let env = RawSettings::from_lookup(lookup_from(&[
            ("FX_FEED_MIN_INTERVAL_SECS", "600"),
            ("FX_FEED_BASE_PRICE", "1.17"),
        ]))
        .unwrap();
        let overrides = RawSettings {
            base_price: Some(1.155),
            ..RawSettings::default()
        };

        let settings = load_settings_with(overrides, env, &path).expect("settings load");

        assert_eq!(settings.synthetic.base_price, 1.155);
        assert_eq!(settings.policy.min_interval, Duration::from_secs(600));
        assert_eq!(settings.policy.request_ceiling, 7);
        assert_eq!(settings.history_len, 10);
    }

    #[test]
    fn empty_environment_values_count_as_unset() {
        let env = RawSettings::from_lookup(lookup_from(&[
            ("ALPHA_VANTAGE_API_KEY", "   "),
            ("FX_FEED_PAIR", ""),
        ]))
        .unwrap();

        assert!(env.api_key.is_none());
        assert!(env.pair.is_none());
    }

    #[test]
    fn rejects_non_numeric_environment_values() {
        let err = RawSettings::from_lookup(lookup_from(&[("FX_FEED_REQUEST_CEILING", "lots")]))
            .expect_err("parse should fail");
        let message = err.to_string();
        assert!(
            message.contains("FX_FEED_REQUEST_CEILING"),
            "unexpected error message: {message}"
        );
    }

    #[test]
    fn out_of_range_environment_values_are_rejected_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let env = RawSettings::from_lookup(lookup_from(&[
            ("FX_FEED_HISTORY", "18446744073709551615"),
            ("FX_FEED_MAX_RETRIES", "4294967295"),
            ("FX_FEED_RETRY_DELAY_MS", "18446744073709551615"),
        ]))
        .expect("values parse");

        let err = load_settings_with(RawSettings::default(), env, &dir.path().join("missing.json"))
            .expect_err("validation should fail");
        let message = err.to_string();
        assert!(message.contains("history length"), "{message}");
        assert!(message.contains("max retries"), "{message}");
    }

    #[test]
    fn settings_file_can_replace_session_bands() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_settings_file(
            dir.path(),
            r#"{ "sessions": [ { "start_hour": 0, "end_hour": 5, "multiplier": 2.0 } ],
                 "off_session_multiplier": 0.5 }"#,
        );

        let settings =
            load_settings_with(RawSettings::default(), RawSettings::default(), &path).unwrap();

        assert_eq!(settings.synthetic.sessions.len(), 1);
        assert_eq!(settings.synthetic.sessions[0].multiplier, 2.0);
        assert_eq!(settings.synthetic.off_session_multiplier, 0.5);
    }

    #[test]
    fn production_without_key_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let env = RawSettings::from_lookup(lookup_from(&[("FX_FEED_ENV", "production")])).unwrap();

        let err = load_settings_with(
            RawSettings::default(),
            env,
            &dir.path().join("missing.json"),
        )
        .expect_err("production requires a key");

        assert!(matches!(err, AppError::Config(_)));
        assert!(
            err.to_string().contains("ALPHA_VANTAGE_API_KEY"),
            "unexpected error message: {err}"
        );
    }

    #[test]
    fn malformed_settings_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_settings_file(dir.path(), "{ not json");

        let err = RawSettings::from_file(&path).expect_err("parse should fail");
        assert!(
            err.to_string().contains("failed to parse settings file"),
            "unexpected error message: {err}"
        );
    }
}
