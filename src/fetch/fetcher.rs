use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Timelike, Utc};
use log::{debug, info, warn};
use tokio::time::timeout;

use crate::config::{CurrencyPair, FetchPolicy};
use crate::records::{CachedRate, RateStore};
use crate::simulate::SyntheticPriceGenerator;
use crate::utils::time::elapsed_between;
use crate::utils::Clock;

use super::{DataSource, FetchBudget, RateProvider, RateSample};

/// Gates remote rate requests and always answers with the best value available:
/// a fresh fetch, then the cached rate while it is young enough, then a synthetic price.
pub struct RateLimitedFetcher {
    pair: CurrencyPair,
    cache_key: String,
    policy: FetchPolicy,
    provider: Option<Arc<dyn RateProvider>>,
    store: Arc<dyn RateStore>,
    generator: SyntheticPriceGenerator,
    clock: Arc<dyn Clock>,
    budget: Mutex<FetchBudget>,
    last_value: Mutex<Option<f64>>,
    in_flight: AtomicBool,
}

impl RateLimitedFetcher {
    /// A fetcher without a provider runs on cached and synthetic data only.
    pub fn new(
        pair: CurrencyPair,
        policy: FetchPolicy,
        generator: SyntheticPriceGenerator,
        store: Arc<dyn RateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let budget = FetchBudget::new(clock.now());
        Self {
            cache_key: pair.cache_key(),
            pair,
            policy,
            provider: None,
            store,
            generator,
            clock,
            budget: Mutex::new(budget),
            last_value: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn RateProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    pub fn provider_name(&self) -> Option<&'static str> {
        self.provider.as_ref().map(|provider| provider.name())
    }

    pub fn budget(&self) -> FetchBudget {
        *self.lock_budget()
    }

    /// Remote calls still permitted in the current quota window.
    pub fn remaining_requests(&self) -> u32 {
        self.lock_budget().remaining(&self.policy, self.clock.now())
    }

    pub fn can_fetch(&self) -> bool {
        self.lock_budget().allows(&self.policy, self.clock.now())
    }

    /// Best-effort current rate. Remote failures and throttling degrade to the
    /// fallback chain and are never returned to the caller.
    pub async fn get_current_rate(&self) -> RateSample {
        let Some(provider) = self.provider.as_ref() else {
            return self.fallback();
        };

        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            debug!("Rate request for {} already in flight, serving fallback", self.pair);
            return self.fallback();
        };

        if !self.can_fetch() {
            debug!("Request budget for {} exhausted or paced, serving fallback", self.pair);
            return self.fallback();
        }

        match timeout(self.policy.call_deadline, provider.fetch_rate(&self.pair)).await {
            Ok(Ok(rate)) => self.accept(rate),
            Ok(Err(err)) => {
                warn!("{} request for {} failed: {}", provider.name(), self.pair, err);
                self.fallback()
            }
            Err(_) => {
                warn!(
                    "{} request for {} exceeded {:?}",
                    provider.name(),
                    self.pair,
                    self.policy.call_deadline
                );
                self.fallback()
            }
        }
    }

    /// Cached rate while younger than the staleness ceiling, otherwise a synthetic price.
    pub fn fallback(&self) -> RateSample {
        let now = self.clock.now();

        if let Some(cached) = self.fresh_cached(now) {
            self.remember(cached.rate);
            return RateSample::new(cached.rate, cached.timestamp, DataSource::Cached);
        }

        let previous = *self.lock_last_value();
        let value = self.generator.generate(previous, now.hour());
        self.remember(value);
        RateSample::new(value, now, DataSource::Simulated)
    }

    fn accept(&self, rate: f64) -> RateSample {
        let now = self.clock.now();

        let record = CachedRate {
            rate,
            timestamp: now,
        };
        if let Err(err) = self.store.save(&self.cache_key, &record) {
            warn!("Failed to cache {} rate: {}", self.pair, err);
        }

        self.lock_budget().record(&self.policy, now);
        self.remember(rate);

        info!("Live {} rate: {:.5}", self.pair, rate);
        RateSample::new(rate, now, DataSource::Live)
    }

    fn fresh_cached(&self, now: DateTime<Utc>) -> Option<CachedRate> {
        match self.store.load(&self.cache_key) {
            Ok(Some(cached))
                if cached.rate.is_finite()
                    && elapsed_between(cached.timestamp, now) < self.policy.staleness =>
            {
                Some(cached)
            }
            Ok(_) => None,
            Err(err) => {
                warn!("Failed to read cached {} rate: {}", self.pair, err);
                None
            }
        }
    }

    fn remember(&self, value: f64) {
        *self.lock_last_value() = Some(value);
    }

    fn lock_budget(&self) -> MutexGuard<'_, FetchBudget> {
        self.budget.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_last_value(&self) -> MutexGuard<'_, Option<f64>> {
        self.last_value
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Marks a remote call as running; cleared on drop, including cancellation.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
