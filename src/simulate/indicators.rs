use std::fmt;

use rand::Rng;

const RSI_STEP: f64 = 1.5;
const MACD_STEP: f64 = 0.0004;
const TREND_THRESHOLD: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    OneHour,
    FourHours,
    OneDay,
    OneWeek,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::OneHour,
        Timeframe::FourHours,
        Timeframe::OneDay,
        Timeframe::OneWeek,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
            Timeframe::OneDay => "1d",
            Timeframe::OneWeek => "1w",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Bullish,
    Neutral,
    Bearish,
}

impl Trend {
    fn from_macd(macd: f64) -> Self {
        if macd > TREND_THRESHOLD {
            Trend::Bullish
        } else if macd < -TREND_THRESHOLD {
            Trend::Bearish
        } else {
            Trend::Neutral
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Bullish => "bullish",
            Trend::Neutral => "neutral",
            Trend::Bearish => "bearish",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorFrame {
    pub timeframe: Timeframe,
    pub rsi: f64,
    pub macd: f64,
}

impl IndicatorFrame {
    pub fn trend(&self) -> Trend {
        Trend::from_macd(self.macd)
    }
}

/// Simulated RSI/MACD readings per timeframe, nudged on every refresh.
#[derive(Debug, Clone)]
pub struct IndicatorBoard {
    frames: Vec<IndicatorFrame>,
}

impl Default for IndicatorBoard {
    fn default() -> Self {
        let seeds = [(65.4, 0.0024), (58.2, 0.0018), (48.7, -0.0005), (35.1, -0.0089)];
        let frames = Timeframe::ALL
            .iter()
            .zip(seeds)
            .map(|(timeframe, (rsi, macd))| IndicatorFrame {
                timeframe: *timeframe,
                rsi,
                macd,
            })
            .collect();
        Self { frames }
    }
}

impl IndicatorBoard {
    pub fn frames(&self) -> &[IndicatorFrame] {
        &self.frames
    }

    pub fn frame(&self, timeframe: Timeframe) -> Option<&IndicatorFrame> {
        self.frames.iter().find(|frame| frame.timeframe == timeframe)
    }

    pub fn drift(&mut self) {
        self.drift_with(&mut rand::thread_rng());
    }

    pub fn drift_with<R: Rng>(&mut self, rng: &mut R) {
        for frame in &mut self.frames {
            frame.rsi = (frame.rsi + rng.gen_range(-RSI_STEP..=RSI_STEP)).clamp(0.0, 100.0);
            frame.macd += rng.gen_range(-MACD_STEP..=MACD_STEP);
        }
    }

    /// Compact one-line rendering, e.g. `1h 65.4/+0.0024 bullish`.
    pub fn render(&self) -> String {
        self.frames
            .iter()
            .map(|frame| {
                let sign = if frame.macd >= 0.0 { "+" } else { "" };
                format!(
                    "{} {:.1}/{}{:.4} {}",
                    frame.timeframe.label(),
                    frame.rsi,
                    sign,
                    frame.macd,
                    frame.trend()
                )
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}
