use rand::Rng;

use crate::config::SyntheticConfig;

/// Bounded random walk used whenever no real rate is available.
///
/// Each step moves by a uniform draw scaled by the session volatility of the
/// current UTC hour, plus a small constant drift, and is clamped to the
/// configured band so repeated calls never run away.
#[derive(Debug, Clone)]
pub struct SyntheticPriceGenerator {
    config: SyntheticConfig,
}

impl SyntheticPriceGenerator {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// First configured band covering `hour` wins; otherwise the off-session multiplier.
    pub fn session_multiplier(&self, hour: u32) -> f64 {
        self.config
            .sessions
            .iter()
            .find(|band| band.contains(hour))
            .map(|band| band.multiplier)
            .unwrap_or(self.config.off_session_multiplier)
    }

    /// Next synthetic price for the given UTC hour, drawing from the thread RNG.
    pub fn generate(&self, previous: Option<f64>, hour: u32) -> f64 {
        self.generate_at(previous, hour, &mut rand::thread_rng())
    }

    pub fn generate_at<R: Rng>(&self, previous: Option<f64>, hour: u32, rng: &mut R) -> f64 {
        let start = previous
            .filter(|price| price.is_finite())
            .unwrap_or(self.config.base_price);

        let max_move = self.config.base_max_move * self.session_multiplier(hour);
        let perturbation = if max_move > 0.0 {
            rng.gen_range(-max_move..=max_move)
        } else {
            0.0
        };

        self.clamp(start + perturbation + self.config.drift)
    }

    fn clamp(&self, price: f64) -> f64 {
        price.max(self.config.floor).min(self.config.ceiling)
    }
}
