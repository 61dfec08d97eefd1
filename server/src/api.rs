//! HTTP API of the dashboard.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Local, TimeZone, Utc};
use purpleair::{SensorResponse, Table};

use crate::{
    aqi::{calculate_aqi, cigarettes, epa_correction, round1},
    atmosphere::AirQualitySource,
    history::{self, InvalidPeriod, Period},
    jokes,
    models::{
        AqiReport, Coordinates, CurrentResponse, ErrorBody, HistoryResponse, JokeResponse,
        Location, NearbyResponse, NearbySensor, Readings,
    },
};

/// Most neighbors reported by `/api/nearby`.
pub const MAX_NEARBY: usize = 10;

type Source = Arc<dyn AirQualitySource>;

/// An error answering an API request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Upstream(#[from] purpleair::Error),
}

impl From<InvalidPeriod> for ApiError {
    fn from(e: InvalidPeriod) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(e) => {
                tracing::error!("upstream error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Routes under `/api`, reading from the given source.
pub fn router(source: Source) -> Router {
    Router::new()
        .route("/api/current", get(current))
        .route("/api/history/{period}", get(history))
        .route("/api/nearby", get(nearby))
        .route("/api/joke", get(joke))
        .with_state(source)
}

async fn current(State(source): State<Source>) -> Result<Json<CurrentResponse>, ApiError> {
    let resp = source.sensor().await?;
    Ok(Json(current_report(source.sensor_id(), &resp)))
}

async fn history(
    State(source): State<Source>,
    Path(period): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let period: Period = period.parse()?;
    let table = source.history(period).await?;
    Ok(Json(history::process(source.sensor_id(), period, &table)))
}

async fn nearby(State(source): State<Source>) -> Result<Json<NearbyResponse>, ApiError> {
    let resp = source.sensor().await?;
    let (Some(latitude), Some(longitude)) = (resp.sensor.latitude, resp.sensor.longitude) else {
        return Err(ApiError::BadRequest(
            "Sensor location not available".to_string(),
        ));
    };
    let table = source.nearby(latitude, longitude).await?;
    let reference = Coordinates {
        latitude,
        longitude,
    };
    Ok(Json(nearby_report(source.sensor_id(), reference, &table)))
}

async fn joke() -> Json<JokeResponse> {
    Json(JokeResponse {
        joke: jokes::joke_at(Utc::now()).to_string(),
    })
}

/// Current conditions at the reference sensor, EPA-corrected.
pub fn current_report(sensor_id: u64, resp: &SensorResponse) -> CurrentResponse {
    let s = &resp.sensor;
    let pm25_raw = s.pm25_atm();
    let pm25_corrected = epa_correction(s.pm25_cf1(), s.humidity);
    let aqi = calculate_aqi(pm25_corrected);

    let last_seen_formatted = s
        .last_seen
        .and_then(|t| Local.timestamp_opt(t, 0).single())
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string());

    CurrentResponse {
        sensor_id,
        name: s.name.clone().unwrap_or_else(|| "Unknown".to_string()),
        location: Location {
            latitude: s.latitude,
            longitude: s.longitude,
            altitude: s.altitude,
        },
        model: s.model.clone(),
        firmware: s.firmware_version.clone(),
        last_seen: s.last_seen,
        last_seen_formatted,
        readings: Readings {
            pm25_raw: round1(pm25_raw),
            pm25_corrected: round1(pm25_corrected),
            pm1: round1(s.pm1_0.unwrap_or(0.0)),
            pm10: round1(s.pm10_0.unwrap_or(0.0)),
            temperature_f: s.temperature,
            temperature_c: s.temperature.map(|f| round1((f - 32.0) * 5.0 / 9.0)),
            humidity: s.humidity,
            pressure: round1(s.pressure.unwrap_or(0.0)),
        },
        aqi: AqiReport {
            value: aqi.value,
            category: aqi.category.label().to_string(),
            color: aqi.category.color().to_string(),
            message: aqi.category.message().to_string(),
            cigarettes: (cigarettes(pm25_corrected) * 100.0).round() / 100.0,
        },
        confidence: s.confidence.unwrap_or(100.0),
        channel_state: s.channel_state,
        timestamp: resp.data_time_stamp,
    }
}

/// Neighbors of the reference sensor, cleanest first.
///
/// Uses the sensors' uncorrected PM2.5: the search doesn't return the
/// CF=1 channel the correction needs.
pub fn nearby_report(sensor_id: u64, reference: Coordinates, table: &Table) -> NearbyResponse {
    let mut sensors: Vec<NearbySensor> = table
        .rows()
        .filter(|row| row.i64("sensor_index") != Some(sensor_id as i64))
        .map(|row| {
            let pm25 = row.f64("pm2.5").unwrap_or(0.0);
            let aqi = calculate_aqi(pm25);
            NearbySensor {
                sensor_id: row.i64("sensor_index").and_then(|i| u64::try_from(i).ok()),
                name: row.str("name").unwrap_or("Unknown").to_string(),
                latitude: row.f64("latitude"),
                longitude: row.f64("longitude"),
                pm25: round1(pm25),
                aqi: aqi.value,
                category: aqi.category.label().to_string(),
                color: aqi.category.color().to_string(),
                humidity: row.f64("humidity"),
                temperature: row.f64("temperature"),
            }
        })
        .collect();
    sensors.sort_by_key(|s| s.aqi);

    let nearby_count = sensors.len();
    sensors.truncate(MAX_NEARBY);
    NearbyResponse {
        reference_sensor: sensor_id,
        reference_location: reference,
        nearby_count,
        sensors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use purpleair::Sensor;
    use serde_json::json;

    #[test]
    fn current_report_corrects_pm() {
        let resp = SensorResponse {
            time_stamp: Some(100),
            data_time_stamp: Some(90),
            sensor: Sensor {
                name: Some("Porch".to_string()),
                pm2_5_atm: Some(9.0),
                pm2_5_cf_1: Some(12.0),
                humidity: Some(40.0),
                temperature: Some(212.0),
                last_seen: Some(1_700_000_000),
                ..Default::default()
            },
        };
        let r = current_report(5, &resp);
        assert_eq!(r.sensor_id, 5);
        assert_eq!(r.name, "Porch");
        assert_eq!(r.readings.pm25_raw, 9.0);
        assert_eq!(r.readings.pm25_corrected, 8.6);
        assert_eq!(r.readings.temperature_c, Some(100.0));
        assert_eq!(r.readings.pm10, 0.0);
        assert_eq!(r.aqi.category, "Good");
        assert_eq!(r.aqi.color, "#00e400");
        assert_eq!(r.aqi.cigarettes, 0.39);
        assert_eq!(r.confidence, 100.0);
        assert_eq!(r.timestamp, Some(90));
        assert!(r.last_seen_formatted.is_some());
    }

    #[test]
    fn current_report_defaults() {
        let r = current_report(1, &SensorResponse::default());
        assert_eq!(r.name, "Unknown");
        assert_eq!(r.readings.temperature_c, None);
        assert_eq!(r.last_seen_formatted, None);
    }

    #[test]
    fn nearby_skips_self_sorts_and_limits() {
        let mut data = vec![vec![json!(1), json!("Me"), json!(0.0)]];
        for i in 0..12 {
            data.push(vec![json!(100 + i), json!(format!("n{i}")), json!(50.0 - i as f64)]);
        }
        let table = Table::new(&["sensor_index", "name", "pm2.5"], data);
        let reference = Coordinates {
            latitude: 1.0,
            longitude: 2.0,
        };
        let r = nearby_report(1, reference, &table);

        assert_eq!(r.reference_sensor, 1);
        assert_eq!(r.nearby_count, 12);
        assert_eq!(r.sensors.len(), MAX_NEARBY);
        assert!(r.sensors.iter().all(|s| s.sensor_id != Some(1)));
        assert_eq!(r.sensors[0].name, "n11");
        assert!(r.sensors.windows(2).all(|w| w[0].aqi <= w[1].aqi));
    }
}
