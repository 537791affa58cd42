use reqwest::Url;

use crate::config::CurrencyPair;
use crate::error::FetchError;

use super::FetchResult;

pub const EXCHANGE_RATE_FUNCTION: &str = "CURRENCY_EXCHANGE_RATE";

/// Build the `CURRENCY_EXCHANGE_RATE` query for `pair`.
pub fn build_rate_url(base_url: &str, pair: &CurrencyPair, api_key: &str) -> FetchResult<Url> {
    let params = [
        ("function", EXCHANGE_RATE_FUNCTION),
        ("from_currency", pair.base.as_str()),
        ("to_currency", pair.quote.as_str()),
        ("apikey", api_key),
    ];

    Url::parse_with_params(base_url.trim(), &params)
        .map_err(|err| FetchError::Provider(format!("invalid base url `{base_url}`: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_query_with_pair_and_key() {
        let pair: CurrencyPair = "GBP/JPY".parse().unwrap();
        let url = build_rate_url("https://www.alphavantage.co/query", &pair, "KEY123").unwrap();

        assert_eq!(
            url.as_str(),
            "https://www.alphavantage.co/query?function=CURRENCY_EXCHANGE_RATE&from_currency=GBP&to_currency=JPY&apikey=KEY123"
        );
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let err = build_rate_url("not a url", &CurrencyPair::default(), "KEY").unwrap_err();
        assert!(matches!(err, FetchError::Provider(_)));
    }
}
