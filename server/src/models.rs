//! JSON bodies of the dashboard API.
//!
//! Shared by the server, which produces them, and the dashboard, which
//! consumes them.

use serde::{Deserialize, Serialize};

use crate::stats::{Quartiles, Summary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentResponse {
    pub sensor_id: u64,
    pub name: String,
    pub location: Location,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub last_seen: Option<i64>,
    pub last_seen_formatted: Option<String>,
    pub readings: Readings,
    pub aqi: AqiReport,
    pub confidence: f64,
    pub channel_state: Option<i64>,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Readings {
    pub pm25_raw: f64,
    pub pm25_corrected: f64,
    pub pm1: f64,
    pub pm10: f64,
    pub temperature_f: Option<f64>,
    pub temperature_c: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiReport {
    pub value: u32,
    pub category: String,
    pub color: String,
    pub message: String,
    /// Cigarettes per day equivalent to the current concentration.
    pub cigarettes: f64,
}

/// One sample of the history series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: i64,
    pub datetime: Option<String>,
    /// EPA-corrected PM2.5.
    pub pm25: f64,
    pub pm25_raw: Option<f64>,
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
    pub aqi: u32,
    pub category: String,
    pub color: String,
    /// True for points filled in across a gap in the sensor's reports.
    #[serde(default)]
    pub interpolated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub sensor_id: u64,
    pub period: String,
    pub average_minutes: Option<u32>,
    pub data_points: usize,
    pub data: Vec<HistoryPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iqr: Option<MetricBands>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<MetricStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cigarettes_per_day: Option<f64>,
}

/// Per-point interquartile bands, aligned with [HistoryResponse::data].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBands {
    pub aqi: Vec<Option<Quartiles>>,
    pub temperature: Vec<Option<Quartiles>>,
    pub humidity: Vec<Option<Quartiles>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub aqi: Option<Summary>,
    pub temperature: Option<Summary>,
    pub humidity: Option<Summary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyResponse {
    pub reference_sensor: u64,
    pub reference_location: Coordinates,
    pub nearby_count: usize,
    pub sensors: Vec<NearbySensor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbySensor {
    pub sensor_id: Option<u64>,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub pm25: f64,
    pub aqi: u32,
    pub category: String,
    pub color: String,
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JokeResponse {
    pub joke: String,
}

/// Body of every non-2xx API response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// A charted quantity of the history series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Metric {
    #[default]
    Aqi,
    Temperature,
    Humidity,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Aqi => "AQI",
            Metric::Temperature => "Temperature (°F)",
            Metric::Humidity => "Humidity (%)",
        }
    }

    /// The value of this metric at one point, if recorded.
    pub fn value(&self, point: &HistoryPoint) -> Option<f64> {
        match self {
            Metric::Aqi => Some(point.aqi as f64),
            Metric::Temperature => point.temperature,
            Metric::Humidity => point.humidity,
        }
    }

    pub fn bands<'a>(&self, bands: &'a MetricBands) -> &'a [Option<Quartiles>] {
        match self {
            Metric::Aqi => &bands.aqi,
            Metric::Temperature => &bands.temperature,
            Metric::Humidity => &bands.humidity,
        }
    }
}
