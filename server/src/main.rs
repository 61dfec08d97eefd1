use std::sync::Arc;

use anyhow::Context as _;
use aqi_server::{
    atmosphere::{AirQualitySource, FakeSource, PurpleAirSource},
    config::ServerConfig,
    context::Context,
};
use clap::Parser;
use purpleair::{Client, ClientSettings};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    aqi_server::init_logging();
    let config = ServerConfig::parse();

    let ctx = Context::new();
    ctx.cancel_on_interrupt()
        .context("could not set SIGINT handler")?;

    let source: Arc<dyn AirQualitySource> = match (&config.api_key, config.fake) {
        (Some(key), false) => {
            let client = Client::new(key.clone(), ClientSettings::default())?;
            tracing::info!("reading PurpleAir sensor {}", config.sensor_id);
            Arc::new(PurpleAirSource::new(client, config.sensor_id))
        }
        _ => {
            tracing::info!("serving demo data");
            Arc::new(FakeSource::demo())
        }
    };

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("could not bind {}", config.bind))?;
    let app = aqi_server::app(source, &config.static_dir);
    aqi_server::serve(listener, app, ctx).await?;

    tracing::info!("shut down");
    Ok(())
}
