use clap::Parser;
use env_logger::Env;

use fx_feed::app::{build_fetcher, DashboardState, FeedController};
use fx_feed::config::load_settings;
use fx_feed::Result;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = load_settings(cli.overrides(), &cli.settings)?;

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&settings.summary())?);
        }
        Commands::Once => {
            let fetcher = build_fetcher(&settings, !cli.no_persist)?;
            let mut state = DashboardState::new(1);
            state.apply(fetcher.get_current_rate().await);
            println!("{}", state.render_line(&settings.pair.to_string()));
        }
        Commands::Run { ticks } => {
            let fetcher = build_fetcher(&settings, !cli.no_persist)?;
            let mut controller = FeedController::new(settings, fetcher);
            controller.run(ticks).await?;
        }
    }

    Ok(())
}
