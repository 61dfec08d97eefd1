//! Sources of air quality data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use purpleair::{BoundingBox, Client, HistoryQuery, SensorResponse, Table, NEARBY_FIELDS};
use serde_json::json;

use crate::history::Period;

/// Half-width, in degrees, of the box searched for nearby sensors.
/// About 11 km of latitude.
pub const NEARBY_BOX_DEGREES: f64 = 0.1;

/// A type that can read one reference sensor and its neighbors.
#[async_trait]
pub trait AirQualitySource: Send + Sync {
    /// Index of the reference sensor.
    fn sensor_id(&self) -> u64;

    /// Latest data for the reference sensor.
    async fn sensor(&self) -> Result<SensorResponse, purpleair::Error>;

    /// Averaged history of the reference sensor over the period.
    async fn history(&self, period: Period) -> Result<Table, purpleair::Error>;

    /// Outdoor sensors around a point.
    async fn nearby(&self, latitude: f64, longitude: f64) -> Result<Table, purpleair::Error>;
}

/// Reads from the PurpleAir API.
#[derive(Debug, Clone)]
pub struct PurpleAirSource {
    client: Client,
    sensor_id: u64,
}

impl PurpleAirSource {
    pub fn new(client: Client, sensor_id: u64) -> Self {
        PurpleAirSource { client, sensor_id }
    }
}

#[async_trait]
impl AirQualitySource for PurpleAirSource {
    fn sensor_id(&self) -> u64 {
        self.sensor_id
    }

    async fn sensor(&self) -> Result<SensorResponse, purpleair::Error> {
        self.client.sensor(self.sensor_id).await
    }

    async fn history(&self, period: Period) -> Result<Table, purpleair::Error> {
        let start = (Utc::now() - period.span()).timestamp();
        let query = HistoryQuery::since(start, period.average());
        self.client.history(self.sensor_id, &query).await
    }

    async fn nearby(&self, latitude: f64, longitude: f64) -> Result<Table, purpleair::Error> {
        let area = BoundingBox::around(latitude, longitude, NEARBY_BOX_DEGREES);
        self.client.sensors_in(&area, &NEARBY_FIELDS).await
    }
}

/// Fake source: repeatedly provides the indicated data.
///
/// With no history table set, synthesizes a plausible one for whatever
/// period is asked for, including one reporting gap.
#[derive(Debug, Clone, Default)]
pub struct FakeSource {
    pub sensor: SensorResponse,
    pub history: Option<Table>,
    pub nearby: Table,
    /// When set, every read fails with this HTTP status.
    pub failing: Option<u16>,
}

impl FakeSource {
    /// A demo sensor in Portland, OR, with two neighbors.
    pub fn demo() -> Self {
        let now = Utc::now().timestamp();
        let sensor = serde_json::from_value(json!({
            "time_stamp": now,
            "data_time_stamp": now,
            "sensor": {
                "sensor_index": 133437,
                "name": "Demo sensor",
                "latitude": 45.52,
                "longitude": -122.68,
                "altitude": 160,
                "model": "PA-II",
                "firmware_version": "7.02",
                "last_seen": now - 30,
                "confidence": 100,
                "channel_state": 3,
                "pm2.5": 9.8,
                "pm2.5_atm": 9.8,
                "pm2.5_cf_1": 10.4,
                "pm1.0": 6.1,
                "pm10.0": 12.3,
                "temperature": 68,
                "humidity": 44,
                "pressure": 1012.4
            }
        }))
        .unwrap_or_default();
        let nearby = Table::new(
            &["sensor_index", "name", "latitude", "longitude", "pm2.5", "humidity", "temperature"],
            vec![
                vec![json!(133437), json!("Demo sensor"), json!(45.52), json!(-122.68), json!(9.8), json!(44), json!(68)],
                vec![json!(90210), json!("Hilltop"), json!(45.55), json!(-122.7), json!(14.2), json!(40), json!(66)],
                vec![json!(31337), json!("Riverside"), json!(45.5), json!(-122.64), json!(4.1), json!(51), json!(70)],
            ],
        );
        FakeSource {
            sensor,
            history: None,
            nearby,
            failing: None,
        }
    }

    /// A source whose every read fails with the given HTTP status.
    pub fn failing(status: u16) -> Self {
        FakeSource {
            failing: Some(status),
            ..Default::default()
        }
    }

    fn check(&self) -> Result<(), purpleair::Error> {
        match self.failing {
            Some(status) => Err(purpleair::Error::Status {
                status,
                body: "fake source failure".to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Synthesize averaged history rows ending at `now`: a daily cycle in
/// every quantity, and no reports for the sixth through eighth steps.
pub fn synthetic_history(period: Period, now: DateTime<Utc>) -> Table {
    let step = period.average().minutes() as i64 * 60;
    let end = now.timestamp() - now.timestamp() % step;
    let start = end - period.span().num_seconds();
    let rows = (0..)
        .map(|i| start + i * step)
        .take_while(|t| *t <= end)
        .enumerate()
        .filter(|(i, _)| !(5..8).contains(i))
        .map(|(_, t)| {
            let phase = (t % 86_400) as f64 / 86_400.0 * std::f64::consts::TAU;
            let pm = 12.0 + 8.0 * phase.sin();
            vec![
                json!(t),
                json!((pm * 10.0).round() / 10.0),
                json!(((pm * 1.1) * 10.0).round() / 10.0),
                json!((50.0 + 15.0 * phase.cos()).round()),
                json!((65.0 - 10.0 * phase.cos()).round()),
            ]
        })
        .collect();
    let mut table = Table::new(
        &["time_stamp", "pm2.5_atm", "pm2.5_cf_1", "humidity", "temperature"],
        rows,
    );
    table.average = Some(period.average().minutes());
    table
}

#[async_trait]
impl AirQualitySource for FakeSource {
    fn sensor_id(&self) -> u64 {
        self.sensor.sensor.sensor_index.unwrap_or_default()
    }

    async fn sensor(&self) -> Result<SensorResponse, purpleair::Error> {
        self.check()?;
        Ok(self.sensor.clone())
    }

    async fn history(&self, period: Period) -> Result<Table, purpleair::Error> {
        self.check()?;
        Ok(self
            .history
            .clone()
            .unwrap_or_else(|| synthetic_history(period, Utc::now())))
    }

    async fn nearby(&self, _latitude: f64, _longitude: f64) -> Result<Table, purpleair::Error> {
        self.check()?;
        Ok(self.nearby.clone())
    }
}
