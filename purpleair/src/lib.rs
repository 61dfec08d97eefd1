//! Client for the [PurpleAir](https://api.purpleair.com) v1 REST API.
//!
//! Covers the three reads an air-quality dashboard needs: the latest data
//! for one sensor, that sensor's averaged history, and the sensors inside a
//! bounding box.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

mod table;

pub use table::{Row, Table};

/// Base URL of the public API.
pub const API_BASE: &str = "https://api.purpleair.com/v1";

/// Fields requested for sensor history.
pub const HISTORY_FIELDS: [&str; 4] = ["pm2.5_atm", "pm2.5_cf_1", "humidity", "temperature"];

/// Fields requested when searching for nearby sensors.
pub const NEARBY_FIELDS: [&str; 6] = [
    "name",
    "latitude",
    "longitude",
    "pm2.5",
    "humidity",
    "temperature",
];

/// An error in communicating with PurpleAir.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("in PurpleAir request: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("PurpleAir returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid argument for PurpleAir client: {0}")]
    InvalidArgument(&'static str),
}

/// Settings when creating a [Client].
#[non_exhaustive]
pub struct ClientSettings {
    /// Base URL of the API; overridable for tests and proxies.
    pub base_url: String,
    /// Per-request timeout.
    /// Defaults to 30 seconds; ranges from 1 to 300 seconds.
    pub timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientSettings {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Averaging period for history rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Average {
    TenMinute,
    ThirtyMinute,
    Hourly,
    SixHour,
    Daily,
}

impl Average {
    /// Length of the averaging period in minutes, as the API spells it.
    pub const fn minutes(&self) -> u32 {
        match self {
            Average::TenMinute => 10,
            Average::ThirtyMinute => 30,
            Average::Hourly => 60,
            Average::SixHour => 360,
            Average::Daily => 1440,
        }
    }
}

/// Parameters for a sensor history request.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub fields: Vec<String>,
    pub start_timestamp: Option<i64>,
    pub end_timestamp: Option<i64>,
    pub average: Average,
}

impl HistoryQuery {
    /// History of the standard dashboard fields since `start_timestamp`.
    pub fn since(start_timestamp: i64, average: Average) -> Self {
        HistoryQuery {
            fields: HISTORY_FIELDS.iter().map(|f| f.to_string()).collect(),
            start_timestamp: Some(start_timestamp),
            end_timestamp: None,
            average,
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("fields", self.fields.join(",")),
            ("average", self.average.minutes().to_string()),
        ];
        if let Some(start) = self.start_timestamp {
            params.push(("start_timestamp", start.to_string()));
        }
        if let Some(end) = self.end_timestamp {
            params.push(("end_timestamp", end.to_string()));
        }
        params
    }
}

/// A latitude/longitude box, as accepted by the sensor search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub nwlat: f64,
    pub nwlng: f64,
    pub selat: f64,
    pub selng: f64,
}

impl BoundingBox {
    /// A square box extending `degrees` in each direction from a point.
    pub fn around(latitude: f64, longitude: f64, degrees: f64) -> Self {
        BoundingBox {
            nwlat: latitude + degrees,
            nwlng: longitude - degrees,
            selat: latitude - degrees,
            selng: longitude + degrees,
        }
    }

    fn params(&self) -> [(&'static str, String); 4] {
        [
            ("nwlat", self.nwlat.to_string()),
            ("nwlng", self.nwlng.to_string()),
            ("selat", self.selat.to_string()),
            ("selng", self.selng.to_string()),
        ]
    }
}

/// Response of `GET /sensors/{sensor_index}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorResponse {
    #[serde(default)]
    pub time_stamp: Option<i64>,
    #[serde(default)]
    pub data_time_stamp: Option<i64>,
    pub sensor: Sensor,
}

/// Latest data for one sensor.
///
/// Every field is optional: PurpleAir omits what a sensor model lacks,
/// and private sensors may hide their location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Sensor {
    pub sensor_index: Option<u64>,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Feet above sea level.
    pub altitude: Option<f64>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    /// Unix time of the last report.
    pub last_seen: Option<i64>,
    pub confidence: Option<f64>,
    pub channel_state: Option<i64>,

    /// PM2.5 in µg/m³, real-time, ATM calibration.
    #[serde(rename = "pm2.5")]
    pub pm2_5: Option<f64>,
    #[serde(rename = "pm2.5_atm")]
    pub pm2_5_atm: Option<f64>,
    /// PM2.5 in µg/m³, CF=1 calibration.
    #[serde(rename = "pm2.5_cf_1")]
    pub pm2_5_cf_1: Option<f64>,
    #[serde(rename = "pm1.0")]
    pub pm1_0: Option<f64>,
    #[serde(rename = "pm10.0")]
    pub pm10_0: Option<f64>,

    /// Degrees Fahrenheit, measured inside the housing.
    pub temperature: Option<f64>,
    /// Relative humidity (%), measured inside the housing.
    pub humidity: Option<f64>,
    /// Millibars.
    pub pressure: Option<f64>,
}

impl Sensor {
    /// ATM-calibrated PM2.5, falling back to the real-time value, then 0.
    pub fn pm25_atm(&self) -> f64 {
        self.pm2_5_atm.or(self.pm2_5).unwrap_or(0.0)
    }

    /// CF=1 PM2.5, falling back to [Self::pm25_atm].
    pub fn pm25_cf1(&self) -> f64 {
        self.pm2_5_cf_1.unwrap_or_else(|| self.pm25_atm())
    }
}

impl core::fmt::Display for Sensor {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "{}\nPM2.5: {:.1} µg/m³ (cf=1 {:.1})\nT: {:.0} °F\nRH: {:.0}%",
            self.name.as_deref().unwrap_or("Unknown"),
            self.pm25_atm(),
            self.pm25_cf1(),
            self.temperature.unwrap_or(f64::NAN),
            self.humidity.unwrap_or(f64::NAN),
        )
    }
}

/// Handle to the PurpleAir API.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl core::fmt::Debug for Client {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Keep the key out of logs.
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client authenticating with the given read key.
    pub fn new(api_key: impl Into<String>, settings: ClientSettings) -> Result<Self, Error> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidArgument("API key must not be empty"));
        }
        let timeout = settings.timeout.as_secs();
        if !(1..=300).contains(&timeout) {
            return Err(Error::InvalidArgument(
                "timeout must be between 1 and 300 seconds",
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Client {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Latest data for one sensor.
    pub async fn sensor(&self, sensor_index: u64) -> Result<SensorResponse, Error> {
        self.get(&format!("sensors/{sensor_index}"), &[]).await
    }

    /// Averaged history for one sensor.
    pub async fn history(&self, sensor_index: u64, query: &HistoryQuery) -> Result<Table, Error> {
        self.get(&format!("sensors/{sensor_index}/history"), &query.params())
            .await
    }

    /// Outdoor sensors inside a bounding box.
    pub async fn sensors_in(&self, area: &BoundingBox, fields: &[&str]) -> Result<Table, Error> {
        let mut params = vec![
            ("fields", fields.join(",")),
            // 0 = outside
            ("location_type", "0".to_string()),
        ];
        params.extend(area.params());
        self.get("sensors", &params).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, Error> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("PurpleAir {} returned {}", path, status);
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_bad_settings() {
        let err = Client::new("  ", ClientSettings::default()).expect_err("empty key");
        assert!(matches!(err, Error::InvalidArgument(_)));

        let settings = ClientSettings {
            timeout: Duration::from_secs(0),
            ..Default::default()
        };
        let err = Client::new("key", settings).expect_err("zero timeout");
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn trims_base_url() {
        let settings = ClientSettings::default().with_base_url("http://localhost:9000/v1/");
        let client = Client::new("secret-read-key", settings).expect("valid settings");
        assert_eq!(client.base_url, "http://localhost:9000/v1");
        assert!(!format!("{client:?}").contains("secret"));
    }

    #[test]
    fn history_params() {
        let q = HistoryQuery::since(1_700_000_000, Average::SixHour);
        let params = q.params();
        assert_eq!(
            params[0],
            ("fields", "pm2.5_atm,pm2.5_cf_1,humidity,temperature".to_string())
        );
        assert_eq!(params[1], ("average", "360".to_string()));
        assert_eq!(params[2], ("start_timestamp", "1700000000".to_string()));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn bounding_box_around_point() {
        let b = BoundingBox::around(45.5, -122.6, 0.1);
        assert!((b.nwlat - 45.6).abs() < 1e-9);
        assert!((b.nwlng - -122.7).abs() < 1e-9);
        assert!((b.selat - 45.4).abs() < 1e-9);
        assert!((b.selng - -122.5).abs() < 1e-9);
    }

    #[test]
    fn decodes_sensor() {
        let resp: SensorResponse = serde_json::from_value(json!({
            "api_version": "V1.0.11-0.0.49",
            "time_stamp": 1700000100,
            "data_time_stamp": 1700000090,
            "sensor": {
                "sensor_index": 133437,
                "name": "Backyard",
                "latitude": 45.5,
                "longitude": -122.6,
                "pm2.5_atm": 8.4,
                "pm2.5_cf_1": 9.1,
                "pm10.0": 11.0,
                "humidity": 40,
                "temperature": 71,
                "stats": {"pm2.5": 8.0}
            }
        }))
        .expect("sensor should decode");
        assert_eq!(resp.data_time_stamp, Some(1700000090));
        let s = resp.sensor;
        assert_eq!(s.sensor_index, Some(133437));
        assert_eq!(s.pm25_atm(), 8.4);
        assert_eq!(s.pm25_cf1(), 9.1);
        assert_eq!(s.pm10_0, Some(11.0));
        assert_eq!(s.humidity, Some(40.0));
        assert_eq!(s.pressure, None);
    }

    #[test]
    fn pm25_fallbacks() {
        let s = Sensor {
            pm2_5: Some(5.0),
            ..Default::default()
        };
        assert_eq!(s.pm25_atm(), 5.0);
        assert_eq!(s.pm25_cf1(), 5.0);
        assert_eq!(Sensor::default().pm25_cf1(), 0.0);
    }
}
