pub mod bootstrap;
pub mod controller;
pub mod state;

pub use bootstrap::build_fetcher;
pub use controller::FeedController;
pub use state::DashboardState;
