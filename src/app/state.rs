use std::collections::VecDeque;

use crate::fetch::{DataSource, RateSample};
use crate::simulate::IndicatorBoard;
use crate::utils::{format_change, format_percent_change, format_price};

/// What the refresh loop shows: the latest sample, its change and a short history.
#[derive(Debug, Clone)]
pub struct DashboardState {
    current: Option<RateSample>,
    change: f64,
    history: VecDeque<RateSample>,
    history_len: usize,
    indicators: IndicatorBoard,
    updates: u64,
}

impl DashboardState {
    pub fn new(history_len: usize) -> Self {
        let history_len = history_len.max(1);
        Self {
            current: None,
            change: 0.0,
            history: VecDeque::new(),
            history_len,
            indicators: IndicatorBoard::default(),
            updates: 0,
        }
    }

    pub fn apply(&mut self, sample: RateSample) {
        self.change = self
            .current
            .map(|previous| sample.value - previous.value)
            .unwrap_or(0.0);
        self.current = Some(sample);

        if self.history.len() == self.history_len {
            self.history.pop_front();
        }
        self.history.push_back(sample);

        self.indicators.drift();
        self.updates += 1;
    }

    pub fn current(&self) -> Option<&RateSample> {
        self.current.as_ref()
    }

    pub fn change(&self) -> f64 {
        self.change
    }

    pub fn source(&self) -> Option<DataSource> {
        self.current.map(|sample| sample.source)
    }

    pub fn history(&self) -> &VecDeque<RateSample> {
        &self.history
    }

    pub fn indicators(&self) -> &IndicatorBoard {
        &self.indicators
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Lowest and highest value in the retained history.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.history.iter().fold(None, |range, sample| match range {
            None => Some((sample.value, sample.value)),
            Some((low, high)) => Some((low.min(sample.value), high.max(sample.value))),
        })
    }

    /// One status line, e.g. `10:03:00 EUR/USD 1.1662 +0.0003 (+0.026%) [Alpha Vantage]`.
    pub fn render_line(&self, pair: &str) -> String {
        let Some(current) = self.current else {
            return format!("{pair} waiting for first sample");
        };

        let percent = format_percent_change(current.value, current.value - self.change)
            .unwrap_or_else(|| "n/a".to_string());
        let mut line = format!(
            "{} {} {} {} ({}) [{}]",
            current.observed_at.format("%H:%M:%S"),
            pair,
            format_price(current.value),
            format_change(self.change),
            percent,
            current.source
        );

        if let Some((low, high)) = self.range() {
            line.push_str(&format!(
                " range {}-{}",
                format_price(low),
                format_price(high)
            ));
        }
        line
    }
}
