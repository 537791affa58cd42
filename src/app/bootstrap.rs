use std::sync::Arc;

use log::info;

use crate::config::{classify_api_key, KeyStatus, Settings};
use crate::error::Result;
use crate::fetch::{AlphaVantageProvider, RateLimitedFetcher};
use crate::records::{JsonFileStore, MemoryStore, RateStore};
use crate::simulate::SyntheticPriceGenerator;
use crate::utils::SystemClock;

/// Wire the fetcher from resolved settings: provider when a key is configured,
/// file-backed cache unless persistence is disabled.
pub fn build_fetcher(settings: &Settings, persist: bool) -> Result<RateLimitedFetcher> {
    let store: Arc<dyn RateStore> = if persist {
        let store = JsonFileStore::new(settings.cache_dir.clone());
        store.prepare()?;
        Arc::new(store)
    } else {
        Arc::new(MemoryStore::new())
    };

    let fetcher = RateLimitedFetcher::new(
        settings.pair.clone(),
        settings.policy,
        SyntheticPriceGenerator::new(settings.synthetic.clone()),
        store,
        Arc::new(SystemClock),
    );

    match classify_api_key(settings.provider.api_key.as_deref()) {
        KeyStatus::Missing => {
            info!("Serving {} from cache and synthetic data only", settings.pair);
            Ok(fetcher)
        }
        _ => {
            let provider = AlphaVantageProvider::new(&settings.provider)?;
            info!(
                "Fetching {} from {} (ceiling {}, min interval {}s)",
                settings.pair,
                settings.provider.base_url,
                settings.policy.request_ceiling,
                settings.policy.min_interval.as_secs()
            );
            Ok(fetcher.with_provider(Arc::new(provider)))
        }
    }
}
