pub mod indicators;
pub mod price;

pub use indicators::{IndicatorBoard, IndicatorFrame, Timeframe, Trend};
pub use price::SyntheticPriceGenerator;
