//! Turning raw sensor history into a chartable series.

use std::{fmt, str::FromStr};

use chrono::{Local, TimeZone};
use purpleair::{Average, Row, Table};

use crate::{
    aqi::{calculate_aqi, cigarettes, epa_correction, round1},
    models::{HistoryPoint, HistoryResponse, Metric, MetricBands, MetricStats},
    stats::{self, Quartiles},
};

/// Gaps longer than this many averaging steps are left open:
/// the sensor was offline, and a straight line would be a fabrication.
const MAX_FILL_STEPS: i64 = 24;

/// Fewest points for which IQR bands are computed.
const MIN_BAND_POINTS: usize = 4;

/// A window of history the dashboard can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid period. Use 24h, 7d, or 30d")]
pub struct InvalidPeriod;

impl FromStr for Period {
    type Err = InvalidPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(Period::Day),
            "7d" => Ok(Period::Week),
            "30d" => Ok(Period::Month),
            _ => Err(InvalidPeriod),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Period {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "24h",
            Period::Week => "7d",
            Period::Month => "30d",
        }
    }

    /// How far back the window reaches.
    pub fn span(&self) -> chrono::Duration {
        match self {
            Period::Day => chrono::Duration::hours(24),
            Period::Week => chrono::Duration::days(7),
            Period::Month => chrono::Duration::days(30),
        }
    }

    /// Averaging requested from the sensor for this window.
    pub const fn average(&self) -> Average {
        match self {
            Period::Day => Average::TenMinute,
            Period::Week => Average::Hourly,
            Period::Month => Average::SixHour,
        }
    }

    /// Points in the centered window each IQR band is computed over.
    /// Roughly an hour, half a day, and two days respectively.
    const fn band_window(&self) -> usize {
        match self {
            Period::Day => 7,
            Period::Week => 13,
            Period::Month => 9,
        }
    }
}

/// Build the history response from a sensor history table.
pub fn process(sensor_id: u64, period: Period, table: &Table) -> HistoryResponse {
    let step_minutes = table.average.unwrap_or(period.average().minutes());

    let mut points: Vec<HistoryPoint> = table.rows().filter_map(to_point).collect();
    points.sort_by_key(|p| p.timestamp);
    points.dedup_by_key(|p| p.timestamp);
    let skipped = table.len() - points.len();
    if skipped > 0 {
        tracing::debug!("dropped {skipped} history rows without a unique timestamp");
    }

    let points = fill_gaps(points, step_minutes as i64 * 60);
    let iqr = bands(&points, period.band_window());

    let real: Vec<&HistoryPoint> = points.iter().filter(|p| !p.interpolated).collect();
    let summary_of = |m: Metric| {
        let values: Vec<f64> = real.iter().filter_map(|p| m.value(p)).collect();
        stats::summarize(&values)
    };
    let stats = MetricStats {
        aqi: summary_of(Metric::Aqi),
        temperature: summary_of(Metric::Temperature),
        humidity: summary_of(Metric::Humidity),
    };
    let stats = (stats.aqi.is_some() || stats.temperature.is_some() || stats.humidity.is_some())
        .then_some(stats);

    let cigarettes_per_day = (!real.is_empty()).then(|| {
        let mean = real.iter().map(|p| p.pm25).sum::<f64>() / real.len() as f64;
        (cigarettes(mean) * 100.0).round() / 100.0
    });

    HistoryResponse {
        sensor_id,
        period: period.to_string(),
        average_minutes: Some(step_minutes),
        data_points: points.len(),
        data: points,
        iqr,
        stats,
        cigarettes_per_day,
    }
}

fn to_point(row: Row<'_>) -> Option<HistoryPoint> {
    let timestamp = row.i64("time_stamp")?;
    let pm25_raw = row.f64("pm2.5_atm");
    let pm25_cf1 = row.f64("pm2.5_cf_1").or(pm25_raw);
    let humidity = row.f64("humidity");
    let temperature = row.f64("temperature");

    let pm25 = match pm25_cf1 {
        Some(pm) if pm > 0.0 => round1(epa_correction(pm, humidity)),
        _ => 0.0,
    };
    Some(point(timestamp, pm25, pm25_raw, humidity, temperature, false))
}

fn point(
    timestamp: i64,
    pm25: f64,
    pm25_raw: Option<f64>,
    humidity: Option<f64>,
    temperature: Option<f64>,
    interpolated: bool,
) -> HistoryPoint {
    let aqi = calculate_aqi(pm25);
    let datetime = Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string());
    HistoryPoint {
        timestamp,
        datetime,
        pm25,
        pm25_raw,
        humidity,
        temperature,
        aqi: aqi.value,
        category: aqi.category.label().to_string(),
        color: aqi.category.color().to_string(),
        interpolated,
    }
}

/// Insert linearly-interpolated points into gaps of more than one and a
/// half averaging steps, one per missing step.
fn fill_gaps(points: Vec<HistoryPoint>, step: i64) -> Vec<HistoryPoint> {
    if step <= 0 || points.len() < 2 {
        return points;
    }
    let mut out = Vec::with_capacity(points.len());
    let mut iter = points.into_iter().peekable();
    while let Some(a) = iter.next() {
        let Some(b) = iter.peek() else {
            out.push(a);
            break;
        };
        let gap = b.timestamp - a.timestamp;
        let fill = gap * 2 > step * 3 && gap <= step * MAX_FILL_STEPS;
        let filled: Vec<HistoryPoint> = if fill {
            (1..)
                .map(|k| a.timestamp + k * step)
                .take_while(|t| b.timestamp - t > step / 2)
                .map(|t| {
                    let f = (t - a.timestamp) as f64 / gap as f64;
                    let lerp = |x: f64, y: f64| x + (y - x) * f;
                    let both = |x: Option<f64>, y: Option<f64>| Some(round1(lerp(x?, y?)));
                    point(
                        t,
                        round1(lerp(a.pm25, b.pm25)),
                        None,
                        both(a.humidity, b.humidity),
                        both(a.temperature, b.temperature),
                        true,
                    )
                })
                .collect()
        } else {
            Vec::new()
        };
        out.push(a);
        out.extend(filled);
    }
    out
}

/// Rolling interquartile bands for each metric, one per point.
///
/// Only measured samples count, both toward the minimum and inside each
/// window; interpolated points still get the band of their neighbors.
fn bands(points: &[HistoryPoint], window: usize) -> Option<MetricBands> {
    if points.iter().filter(|p| !p.interpolated).count() < MIN_BAND_POINTS {
        return None;
    }
    let half = window / 2;
    let for_metric = |m: Metric| -> Vec<Option<Quartiles>> {
        (0..points.len())
            .map(|i| {
                let lo = i.saturating_sub(half);
                let hi = (i + half + 1).min(points.len());
                let values: Vec<f64> = points[lo..hi]
                    .iter()
                    .filter(|p| !p.interpolated)
                    .filter_map(|p| m.value(p))
                    .collect();
                stats::quartiles(&values)
            })
            .collect()
    };
    Some(MetricBands {
        aqi: for_metric(Metric::Aqi),
        temperature: for_metric(Metric::Temperature),
        humidity: for_metric(Metric::Humidity),
    })
}
