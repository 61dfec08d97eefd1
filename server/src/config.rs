//! Command-line and environment configuration.

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

use crate::{history::Period, models::Metric};

/// Serve the air quality API for one PurpleAir sensor.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct ServerConfig {
    /// PurpleAir read key.
    #[arg(long, env = "PURPLEAIR_API_KEY", hide_env_values = true, required_unless_present = "fake")]
    pub api_key: Option<String>,

    /// Index of the reference sensor.
    #[arg(long, env = "SENSOR_ID", default_value_t = 133437)]
    pub sensor_id: u64,

    /// Address to listen on.
    #[arg(long, env = "AQI_BIND", default_value = "0.0.0.0:8001")]
    pub bind: SocketAddr,

    /// Directory holding index.html and other static files.
    #[arg(long, env = "AQI_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Serve canned demo data instead of reading PurpleAir.
    #[arg(long)]
    pub fake: bool,
}

/// Poll the air quality API and draw a dashboard in the terminal.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct DashboardConfig {
    /// Base URL of the API.
    #[arg(long, env = "AQI_URL", default_value = "http://127.0.0.1:8001")]
    pub url: String,

    /// History window: 24h, 7d, or 30d.
    #[arg(long, default_value = "24h")]
    pub period: Period,

    /// Metric to chart.
    #[arg(long, value_enum, default_value_t = Metric::Aqi)]
    pub metric: Metric,

    /// Draw once and exit instead of refreshing.
    #[arg(long)]
    pub once: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let c = ServerConfig::try_parse_from(["aqi-server", "--api-key", "k"]).expect("valid");
        assert_eq!(c.api_key.as_deref(), Some("k"));
        assert_eq!(c.bind.port(), 8001);
        assert!(!c.fake);
    }

    #[test]
    fn fake_needs_no_key() {
        let c = ServerConfig::try_parse_from(["aqi-server", "--fake", "--sensor-id", "7"])
            .expect("valid");
        assert!(c.fake);
        assert_eq!(c.sensor_id, 7);
    }

    #[test]
    fn dashboard_args() {
        let c = DashboardConfig::try_parse_from([
            "dashboard",
            "--period",
            "7d",
            "--metric",
            "humidity",
            "--once",
        ])
        .expect("valid");
        assert_eq!(c.period, Period::Week);
        assert_eq!(c.metric, Metric::Humidity);
        assert!(c.once);

        DashboardConfig::try_parse_from(["dashboard", "--period", "1y"])
            .expect_err("bad period");
    }
}
