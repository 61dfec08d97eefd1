//! Terminal dashboard for a running `aqi-server`.

use std::time::Duration;

use anyhow::Context as _;
use aqi_server::{
    config::DashboardConfig,
    context::Context,
    dashboard::{client::ApiClient, read_commands, view::TextView, Dashboard, Timers},
};
use clap::Parser;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    aqi_server::init_logging();
    let config = DashboardConfig::parse();

    let api = ApiClient::new(&config.url, REQUEST_TIMEOUT)?;
    let mut dashboard = Dashboard::new(api, TextView::stdout(), config.period, config.metric);

    tracing::info!("loading dashboard from {}", config.url);
    dashboard.start().await;
    if config.once {
        return Ok(());
    }

    let ctx = Context::new();
    ctx.cancel_on_interrupt()
        .context("could not set SIGINT handler")?;

    tracing::info!("commands: r (refresh), m <aqi|temperature|humidity>, p <24h|7d|30d>");
    let commands = read_commands(std::io::BufReader::new(std::io::stdin()));
    dashboard.run(&ctx, Timers::default(), commands).await;
    tracing::info!("shut down");
    Ok(())
}
