pub mod text;
pub mod time;

pub use text::{format_change, format_percent_change, format_price, mask_secret};
pub use time::{Clock, SystemClock};
