use serde::Deserialize;

use crate::config::CurrencyPair;
use crate::error::FetchError;

use super::FetchResult;

#[derive(Debug, Deserialize)]
struct ExchangeRateEnvelope {
    #[serde(rename = "Realtime Currency Exchange Rate")]
    realtime: Option<RealtimeRate>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RealtimeRate {
    #[serde(rename = "1. From_Currency Code")]
    from_code: Option<String>,
    #[serde(rename = "3. To_Currency Code")]
    to_code: Option<String>,
    #[serde(rename = "5. Exchange Rate")]
    exchange_rate: Option<String>,
}

/// Extract the numeric rate from a `CURRENCY_EXCHANGE_RATE` response body.
pub fn parse_exchange_rate(body: &str, pair: &CurrencyPair) -> FetchResult<f64> {
    let envelope: ExchangeRateEnvelope = serde_json::from_str(body)
        .map_err(|err| FetchError::Malformed(format!("response is not the expected JSON: {err}")))?;

    if let Some(message) = envelope.error_message {
        return Err(FetchError::Provider(message));
    }

    let notice = envelope.note.or(envelope.information);
    if let Some(message) = notice.as_deref() {
        if mentions_rate_limit(message) {
            return Err(FetchError::RateLimited(message.to_string()));
        }
    }

    let Some(realtime) = envelope.realtime else {
        return Err(match notice {
            Some(message) => FetchError::Provider(message),
            None => FetchError::Malformed("missing `Realtime Currency Exchange Rate`".to_string()),
        });
    };

    ensure_code("from", realtime.from_code.as_deref(), &pair.base)?;
    ensure_code("to", realtime.to_code.as_deref(), &pair.quote)?;

    let raw = realtime
        .exchange_rate
        .ok_or_else(|| FetchError::Malformed("missing `5. Exchange Rate`".to_string()))?;

    let rate = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| FetchError::Malformed(format!("exchange rate `{raw}` is not numeric")))?;

    if !rate.is_finite() || rate <= 0.0 {
        return Err(FetchError::Malformed(format!(
            "exchange rate `{raw}` is not a positive number"
        )));
    }

    Ok(rate)
}

fn mentions_rate_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("call frequency") || lower.contains("rate limit")
}

// The provider omits codes on some mirrors; only a present-and-different code is a mismatch.
fn ensure_code(side: &str, actual: Option<&str>, expected: &str) -> FetchResult<()> {
    match actual {
        Some(code) if !code.trim().eq_ignore_ascii_case(expected) => Err(FetchError::Malformed(
            format!("{side} currency `{code}` does not match `{expected}`"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eurusd() -> CurrencyPair {
        CurrencyPair::default()
    }

    #[test]
    fn parses_realtime_rate() {
        let body = r#"{
            "Realtime Currency Exchange Rate": {
                "1. From_Currency Code": "EUR",
                "2. From_Currency Name": "Euro",
                "3. To_Currency Code": "USD",
                "4. To_Currency Name": "United States Dollar",
                "5. Exchange Rate": "1.16600000",
                "6. Last Refreshed": "2024-05-02 09:15:01",
                "7. Time Zone": "UTC",
                "8. Bid Price": "1.16590000",
                "9. Ask Price": "1.16610000"
            }
        }"#;

        let rate = parse_exchange_rate(body, &eurusd()).unwrap();
        assert!((rate - 1.1660).abs() < 1e-9);
    }

    #[test]
    fn classifies_frequency_note_as_rate_limit() {
        let body = r#"{ "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute." }"#;
        let err = parse_exchange_rate(body, &eurusd()).unwrap_err();
        assert!(matches!(err, FetchError::RateLimited(_)), "{err:?}");
    }

    #[test]
    fn classifies_daily_limit_information_as_rate_limit() {
        let body = r#"{ "Information": "We have detected your API key and our standard API rate limit is 25 requests per day." }"#;
        let err = parse_exchange_rate(body, &eurusd()).unwrap_err();
        assert!(matches!(err, FetchError::RateLimited(_)), "{err:?}");
    }

    #[test]
    fn surfaces_provider_error_message() {
        let body = r#"{ "Error Message": "Invalid API call. Please retry or visit the documentation." }"#;
        let err = parse_exchange_rate(body, &eurusd()).unwrap_err();
        assert!(matches!(err, FetchError::Provider(ref msg) if msg.contains("Invalid API call")));
    }

    #[test]
    fn rejects_missing_or_non_numeric_rate() {
        let missing = r#"{ "Realtime Currency Exchange Rate": { "1. From_Currency Code": "EUR" } }"#;
        assert!(matches!(
            parse_exchange_rate(missing, &eurusd()),
            Err(FetchError::Malformed(_))
        ));

        let garbage = r#"{ "Realtime Currency Exchange Rate": { "5. Exchange Rate": "n/a" } }"#;
        assert!(matches!(
            parse_exchange_rate(garbage, &eurusd()),
            Err(FetchError::Malformed(_))
        ));

        let negative = r#"{ "Realtime Currency Exchange Rate": { "5. Exchange Rate": "-1.2" } }"#;
        assert!(matches!(
            parse_exchange_rate(negative, &eurusd()),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_unexpected_shapes() {
        assert!(matches!(
            parse_exchange_rate("<html>busy</html>", &eurusd()),
            Err(FetchError::Malformed(_))
        ));
        assert!(matches!(
            parse_exchange_rate("{}", &eurusd()),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_currency_mismatch() {
        let body = r#"{
            "Realtime Currency Exchange Rate": {
                "1. From_Currency Code": "GBP",
                "3. To_Currency Code": "USD",
                "5. Exchange Rate": "1.27"
            }
        }"#;
        let err = parse_exchange_rate(body, &eurusd()).unwrap_err();
        assert!(err.to_string().contains("GBP"), "{err}");
    }
}
