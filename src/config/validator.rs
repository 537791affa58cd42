use log::warn;
use serde::Serialize;

use crate::error::{AppError, Result};

use super::{
    Environment, FetchPolicy, ProviderSettings, Settings, SyntheticConfig, MAX_HISTORY_LEN,
    MAX_RETRIES,
};

const PLACEHOLDER_KEYS: &[&str] = &["demo", "your_api_key_here", "demo_key"];

/// How a configured provider key looks before any request is made with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Missing,
    Placeholder,
    Malformed,
    Valid,
}

/// Alpha Vantage keys are 8 to 32 ASCII alphanumerics.
pub fn classify_api_key(key: Option<&str>) -> KeyStatus {
    let Some(key) = key.map(str::trim).filter(|key| !key.is_empty()) else {
        return KeyStatus::Missing;
    };

    if PLACEHOLDER_KEYS
        .iter()
        .any(|placeholder| key.eq_ignore_ascii_case(placeholder))
    {
        return KeyStatus::Placeholder;
    }

    let well_formed =
        (8..=32).contains(&key.len()) && key.chars().all(|c| c.is_ascii_alphanumeric());
    if well_formed {
        KeyStatus::Valid
    } else {
        KeyStatus::Malformed
    }
}

/// Validate resolved settings, collecting every problem into a single error.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    let mut issues = Vec::new();

    validate_api_key(settings.environment, &settings.provider, &mut issues);
    validate_provider(&settings.provider, &mut issues);
    validate_policy(&settings.policy, &mut issues);
    validate_synthetic(&settings.synthetic, &mut issues);

    if settings.refresh_interval.is_zero() {
        issues.push("refresh interval must be greater than zero".to_string());
    }

    if settings.history_len == 0 || settings.history_len > MAX_HISTORY_LEN {
        issues.push(format!(
            "history length must be between 1 and {MAX_HISTORY_LEN}, got {}",
            settings.history_len
        ));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::config(format!(
            "{} settings invalid:\n  - {}",
            settings.environment,
            issues.join("\n  - ")
        )))
    }
}

fn validate_api_key(environment: Environment, provider: &ProviderSettings, issues: &mut Vec<String>) {
    let status = classify_api_key(provider.api_key.as_deref());

    match (environment, status) {
        (_, KeyStatus::Valid) => {}
        (Environment::Production, KeyStatus::Missing) => issues.push(
            "ALPHA_VANTAGE_API_KEY is not set; production requires a real provider key"
                .to_string(),
        ),
        (Environment::Production, KeyStatus::Placeholder) => issues.push(
            "ALPHA_VANTAGE_API_KEY holds a placeholder value; production requires a real provider key"
                .to_string(),
        ),
        (Environment::Production, KeyStatus::Malformed) => issues.push(
            "ALPHA_VANTAGE_API_KEY must be 8-32 alphanumeric characters".to_string(),
        ),
        (_, KeyStatus::Missing) => {
            warn!("No ALPHA_VANTAGE_API_KEY configured, running on synthetic data only");
        }
        (_, KeyStatus::Placeholder) => {
            warn!("Using a placeholder API key, real market data will likely be unavailable");
        }
        (_, KeyStatus::Malformed) => {
            warn!("ALPHA_VANTAGE_API_KEY does not look like a provider key");
        }
    }
}

fn validate_provider(provider: &ProviderSettings, issues: &mut Vec<String>) {
    let url = provider.base_url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        issues.push(format!("base url `{url}` must use http or https"));
    }

    if provider.timeout.is_zero() {
        issues.push("request timeout must be greater than zero".to_string());
    }

    if provider.max_retries > MAX_RETRIES {
        issues.push(format!(
            "max retries must be at most {MAX_RETRIES}, got {}",
            provider.max_retries
        ));
    }
}

fn validate_policy(policy: &FetchPolicy, issues: &mut Vec<String>) {
    if policy.request_ceiling == 0 {
        issues.push("request ceiling must be at least 1".to_string());
    }

    if policy.min_interval.is_zero() {
        issues.push("minimum request interval must be greater than zero".to_string());
    }

    if let Some(window) = policy.quota_window {
        if window < policy.min_interval {
            issues.push(format!(
                "quota window ({}s) is shorter than the minimum interval ({}s)",
                window.as_secs(),
                policy.min_interval.as_secs()
            ));
        }
    }
}

fn validate_synthetic(synthetic: &SyntheticConfig, issues: &mut Vec<String>) {
    let finite = [
        synthetic.base_price,
        synthetic.floor,
        synthetic.ceiling,
        synthetic.base_max_move,
        synthetic.drift,
        synthetic.off_session_multiplier,
    ]
    .iter()
    .all(|value| value.is_finite());

    if !finite {
        issues.push("synthetic price parameters must be finite numbers".to_string());
        return;
    }

    if synthetic.floor >= synthetic.ceiling {
        issues.push(format!(
            "price floor {} must be below price ceiling {}",
            synthetic.floor, synthetic.ceiling
        ));
    } else if synthetic.base_price < synthetic.floor || synthetic.base_price > synthetic.ceiling {
        issues.push(format!(
            "base price {} lies outside [{}, {}]",
            synthetic.base_price, synthetic.floor, synthetic.ceiling
        ));
    }

    if synthetic.base_max_move < 0.0 {
        issues.push("max move must not be negative".to_string());
    }

    if synthetic.off_session_multiplier <= 0.0 {
        issues.push("off-session multiplier must be positive".to_string());
    }

    for band in &synthetic.sessions {
        let name = band.label.as_deref().unwrap_or("unnamed");
        if band.start_hour > 23 || band.end_hour > 23 {
            issues.push(format!("session `{name}` hours must lie within 0-23"));
        } else if band.start_hour > band.end_hour {
            issues.push(format!(
                "session `{name}` starts at {} after it ends at {}",
                band.start_hour, band.end_hour
            ));
        }

        if !band.multiplier.is_finite() || band.multiplier <= 0.0 {
            issues.push(format!("session `{name}` multiplier must be positive"));
        }
    }
}
