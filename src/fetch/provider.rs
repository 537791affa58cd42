use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode, Url};
use tokio::time::sleep;

use crate::config::{retry_backoff, CurrencyPair, ProviderSettings};
use crate::error::{AppError, Context, FetchError, Result};
use crate::utils::mask_secret;

use super::decode::parse_exchange_rate;
use super::request::build_rate_url;
use super::FetchResult;

/// Remote source of the current exchange rate.
#[async_trait]
pub trait RateProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_rate(&self, pair: &CurrencyPair) -> FetchResult<f64>;
}

/// Alpha Vantage `CURRENCY_EXCHANGE_RATE` client.
pub struct AlphaVantageProvider {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl AlphaVantageProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::config("Alpha Vantage provider requires an API key"))?;

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to construct HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key,
            timeout: settings.timeout,
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay,
        })
    }

    async fn fetch_body(&self, url: &Url) -> FetchResult<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited(format!("HTTP {status}")));
        }

        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        response.text().await.map_err(|err| self.classify(err))
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(mask_secret(&err.without_url().to_string(), &self.api_key))
        }
    }
}

#[async_trait]
impl RateProvider for AlphaVantageProvider {
    fn name(&self) -> &'static str {
        "Alpha Vantage"
    }

    async fn fetch_rate(&self, pair: &CurrencyPair) -> FetchResult<f64> {
        let url = build_rate_url(&self.base_url, pair, &self.api_key)?;
        debug!(
            "Alpha Vantage request: {}",
            mask_secret(url.as_str(), &self.api_key)
        );

        let mut attempt = 1;
        loop {
            match self.fetch_body(&url).await {
                Ok(body) => return parse_exchange_rate(&body, pair),
                Err(err) if err.is_retryable() && attempt <= self.max_retries => {
                    let delay = retry_backoff(self.retry_delay, attempt);
                    warn!(
                        "Alpha Vantage attempt {attempt}/{} for {pair} failed: {err}; retrying in {delay:?}",
                        self.max_retries.saturating_add(1)
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const RATE_BODY: &str = r#"{"Realtime Currency Exchange Rate":{"1. From_Currency Code":"EUR","3. To_Currency Code":"USD","5. Exchange Rate":"1.16600000"}}"#;

    fn settings_for(base_url: String, timeout: Duration) -> ProviderSettings {
        ProviderSettings {
            api_key: Some("TESTKEY123".to_string()),
            base_url,
            timeout,
            max_retries: 3,
            retry_delay: Duration::from_millis(10),
        }
    }

    /// Serve canned HTTP responses, one per connection, in order.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0_u8; 4096];
                let _ = socket.read(&mut buf).await;
                let reply = format!(
                    "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}/query"), hits)
    }

    #[test]
    fn requires_an_api_key() {
        let mut settings = settings_for("http://127.0.0.1/query".to_string(), Duration::from_secs(1));
        settings.api_key = None;

        assert!(matches!(
            AlphaVantageProvider::new(&settings),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn fetches_rate_from_endpoint() {
        let (url, hits) = serve(vec![(200, RATE_BODY)]).await;
        let provider =
            AlphaVantageProvider::new(&settings_for(url, Duration::from_secs(5))).unwrap();

        let rate = provider.fetch_rate(&CurrencyPair::default()).await.unwrap();

        assert!((rate - 1.1660).abs() < 1e-9);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let (url, hits) = serve(vec![(503, "{}"), (200, RATE_BODY)]).await;
        let provider =
            AlphaVantageProvider::new(&settings_for(url, Duration::from_secs(5))).unwrap();

        let rate = provider.fetch_rate(&CurrencyPair::default()).await.unwrap();

        assert!((rate - 1.1660).abs() < 1e-9);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retries_count_beyond_the_first_attempt() {
        let (url, hits) = serve(vec![
            (503, "{}"),
            (502, "{}"),
            (503, "{}"),
            (200, RATE_BODY),
        ])
        .await;
        let provider =
            AlphaVantageProvider::new(&settings_for(url, Duration::from_secs(5))).unwrap();

        let rate = provider.fetch_rate(&CurrencyPair::default()).await.unwrap();

        assert!((rate - 1.1660).abs() < 1e-9);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let (url, hits) = serve(vec![(503, "{}"), (503, "{}"), (200, RATE_BODY)]).await;
        let mut settings = settings_for(url, Duration::from_secs(5));
        settings.max_retries = 1;
        let provider = AlphaVantageProvider::new(&settings).unwrap();

        let err = provider
            .fetch_rate(&CurrencyPair::default())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status(_)), "{err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_http_rate_limit() {
        let (url, hits) = serve(vec![(429, "{}"), (200, RATE_BODY)]).await;
        let provider =
            AlphaVantageProvider::new(&settings_for(url, Duration::from_secs(5))).unwrap();

        let err = provider
            .fetch_rate(&CurrencyPair::default())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::RateLimited(_)), "{err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stalled_endpoint_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hold the connection without ever answering.
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let provider = AlphaVantageProvider::new(&settings_for(
            format!("http://{addr}/query"),
            Duration::from_millis(200),
        ))
        .unwrap();

        let err = provider
            .fetch_rate(&CurrencyPair::default())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout(_)), "{err:?}");
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_key() {
        // Bind then drop so the port refuses connections.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let mut settings = settings_for(format!("http://{addr}/query"), Duration::from_secs(1));
        settings.max_retries = 0;
        let provider = AlphaVantageProvider::new(&settings).unwrap();

        let err = provider
            .fetch_rate(&CurrencyPair::default())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)), "{err:?}");
        assert!(!err.to_string().contains("TESTKEY123"));
    }
}
