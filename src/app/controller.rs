use log::{debug, info};
use tokio::time::{interval, MissedTickBehavior};

use crate::app::state::DashboardState;
use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::fetch::{RateLimitedFetcher, RateSample};

/// Drives the periodic refresh: fetch, fold into the dashboard, print a line.
pub struct FeedController {
    settings: Settings,
    fetcher: RateLimitedFetcher,
    state: DashboardState,
}

impl FeedController {
    pub fn new(settings: Settings, fetcher: RateLimitedFetcher) -> Self {
        let state = DashboardState::new(settings.history_len);
        Self {
            settings,
            fetcher,
            state,
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// One refresh cycle.
    pub async fn tick(&mut self) -> RateSample {
        let sample = self.fetcher.get_current_rate().await;
        self.state.apply(sample);
        sample
    }

    /// Refresh every `refresh_interval` until Ctrl-C, or until `ticks` cycles have run.
    pub async fn run(&mut self, ticks: Option<u64>) -> Result<()> {
        let pair = self.settings.pair.to_string();
        let mut timer = interval(self.settings.refresh_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!(
            "Refreshing {} every {}s",
            pair,
            self.settings.refresh_interval.as_secs()
        );

        let mut completed = 0_u64;
        loop {
            if ticks.is_some_and(|limit| completed >= limit) {
                debug!("Completed {completed} refresh cycles");
                break;
            }

            tokio::select! {
                _ = timer.tick() => {
                    self.tick().await;
                    completed += 1;
                    println!("{}", self.state.render_line(&pair));
                    debug!("{}", self.state.indicators().render());
                    let budget = self.fetcher.budget();
                    debug!(
                        "Remote budget: {} used, {} remaining",
                        budget.count,
                        self.fetcher.remaining_requests()
                    );
                }
                signal = &mut shutdown => {
                    signal.map_err(|err| {
                        AppError::message(format!("failed to listen for Ctrl-C: {err}"))
                    })?;
                    info!("Stopping refresh loop");
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::bootstrap::build_fetcher;
    use crate::fetch::DataSource;
    use std::time::Duration;

    fn synthetic_settings() -> Settings {
        let mut settings = Settings::default();
        settings.refresh_interval = Duration::from_millis(10);
        settings.history_len = 2;
        settings
    }

    #[tokio::test]
    async fn run_stops_after_requested_ticks() {
        let settings = synthetic_settings();
        let fetcher = build_fetcher(&settings, false).unwrap();
        let mut controller = FeedController::new(settings, fetcher);

        controller.run(Some(3)).await.unwrap();

        assert_eq!(controller.state().updates(), 3);
        assert_eq!(controller.state().history().len(), 2);
        assert_eq!(controller.state().source(), Some(DataSource::Simulated));
    }

    #[tokio::test]
    async fn tick_feeds_the_dashboard() {
        let settings = synthetic_settings();
        let fetcher = build_fetcher(&settings, false).unwrap();
        let mut controller = FeedController::new(settings, fetcher);

        let sample = controller.tick().await;

        assert_eq!(controller.state().current(), Some(&sample));
        assert_eq!(controller.state().change(), 0.0);
    }
}
