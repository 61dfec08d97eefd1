//! Where the dashboard draws.

use std::io::Write;

use chrono::Local;

use crate::{
    history::Period,
    models::{CurrentResponse, Metric, NearbySensor},
    stats::{Quartiles, Summary},
};

/// Widest sparkline drawn, in characters.
const CHART_WIDTH: usize = 72;

const SPARKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// A section of the dashboard that can fail to load on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Current,
    History,
    Nearby,
}

impl Section {
    /// Text shown in place of the section's content.
    pub const fn placeholder(&self) -> &'static str {
        match self {
            Section::Current => "Unable to load current readings",
            Section::History => "Unable to load history",
            Section::Nearby => "Unable to load nearby sensors",
        }
    }
}

/// One point of the history chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub timestamp: i64,
    pub value: Option<f64>,
    pub color: String,
    pub interpolated: bool,
}

/// Where the chart's IQR band came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandSource {
    /// Rolling bands computed by the server.
    Server,
    /// One band estimated locally over the whole series.
    Estimated,
}

/// The history chart for one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryChart {
    pub period: Period,
    pub metric: Metric,
    pub points: Vec<ChartPoint>,
    /// One band per point; empty when there's nothing to estimate from.
    pub bands: Vec<Option<Quartiles>>,
    pub band_source: BandSource,
    pub summary: Option<Summary>,
    pub cigarettes_per_day: Option<f64>,
}

/// Content for one section.
#[derive(Debug, Clone, PartialEq)]
pub enum Panel {
    Current(Box<CurrentResponse>),
    History(HistoryChart),
    Nearby(Vec<NearbySensor>),
    Joke(String),
    Unavailable(Section),
}

/// A renderer for the dashboard.
pub trait View {
    /// Replace the content of one section.
    fn render(&mut self, panel: Panel);

    /// Show everything rendered so far.
    fn flush(&mut self) -> std::io::Result<()>;
}

/// Renders the dashboard as text.
pub struct TextView<W> {
    out: W,
    current: Option<String>,
    history: Option<String>,
    nearby: Option<String>,
    joke: Option<String>,
}

impl TextView<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TextView<W> {
    pub fn new(out: W) -> Self {
        TextView {
            out,
            current: None,
            history: None,
            nearby: None,
            joke: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> View for TextView<W> {
    fn render(&mut self, panel: Panel) {
        match panel {
            Panel::Current(c) => self.current = Some(current_text(&c)),
            Panel::History(h) => self.history = Some(history_text(&h)),
            Panel::Nearby(n) => self.nearby = Some(nearby_text(&n)),
            Panel::Joke(j) => self.joke = Some(j),
            Panel::Unavailable(section) => {
                let text = Some(section.placeholder().to_string());
                match section {
                    Section::Current => self.current = text,
                    Section::History => self.history = text,
                    Section::Nearby => self.nearby = text,
                }
            }
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut page = format!("--- {} ---\n", Local::now().format("%Y-%m-%d %H:%M:%S"));
        for (title, body) in [
            ("Now", &self.current),
            ("History", &self.history),
            ("Nearby", &self.nearby),
            ("Joke", &self.joke),
        ] {
            if let Some(body) = body {
                page.push_str(&format!("\n== {title} ==\n{body}\n"));
            }
        }
        self.out.write_all(page.as_bytes())?;
        self.out.flush()
    }
}

fn current_text(c: &CurrentResponse) -> String {
    let r = &c.readings;
    let mut lines = vec![
        format!("{} (#{})", c.name, c.sensor_id),
        format!("AQI {}  {}  [{}]", c.aqi.value, c.aqi.category, c.aqi.color),
        c.aqi.message.clone(),
        format!(
            "PM2.5 {:.1} µg/m³ (raw {:.1})  PM10 {:.1}",
            r.pm25_corrected, r.pm25_raw, r.pm10
        ),
    ];
    let mut weather = Vec::new();
    if let Some(t) = r.temperature_f {
        weather.push(format!("{t:.0} °F"));
    }
    if let Some(h) = r.humidity {
        weather.push(format!("{h:.0}% RH"));
    }
    if r.pressure > 0.0 {
        weather.push(format!("{:.1} mbar", r.pressure));
    }
    if !weather.is_empty() {
        lines.push(weather.join("  "));
    }
    lines.push(format!("≈ {:.2} cigarettes/day", c.aqi.cigarettes));
    if let Some(seen) = &c.last_seen_formatted {
        lines.push(format!("last seen {seen}"));
    }
    lines.join("\n")
}

fn history_text(h: &HistoryChart) -> String {
    let mut lines = vec![format!("{} over {}", h.metric.label(), h.period)];
    lines.push(sparkline(&h.points, CHART_WIDTH));
    match &h.summary {
        Some(s) => lines.push(format!("avg {:.1}  min {:.1}  max {:.1}", s.avg, s.min, s.max)),
        None => lines.push("no data".to_string()),
    }
    if let Some(q) = h.bands.iter().rev().flatten().next() {
        let source = match h.band_source {
            BandSource::Server => "latest",
            BandSource::Estimated => "estimated",
        };
        lines.push(format!("IQR {:.1}–{:.1} ({source})", q.q1, q.q3));
    }
    let filled = h.points.iter().filter(|p| p.interpolated).count();
    if filled > 0 {
        lines.push(format!("{filled} interpolated points (·)"));
    }
    if let Some(c) = h.cigarettes_per_day {
        lines.push(format!("≈ {c:.2} cigarettes/day on average"));
    }
    lines.join("\n")
}

fn nearby_text(sensors: &[NearbySensor]) -> String {
    if sensors.is_empty() {
        return "no sensors nearby".to_string();
    }
    sensors
        .iter()
        .map(|s| format!("{:>4}  {:<24} {}", s.aqi, s.name, s.category))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Draw values as block characters, scaled between the series' extremes.
/// Gaps are blank; interpolated stretches are dotted.
fn sparkline(points: &[ChartPoint], width: usize) -> String {
    if points.is_empty() || width == 0 {
        return String::new();
    }
    // Downsample by averaging runs of points.
    let per_column = points.len().div_ceil(width);
    let columns: Vec<(Option<f64>, bool)> = points
        .chunks(per_column)
        .map(|chunk| {
            let values: Vec<f64> = chunk.iter().filter_map(|p| p.value).collect();
            let mean = (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64);
            (mean, chunk.iter().all(|p| p.interpolated))
        })
        .collect();

    let (lo, hi) = columns
        .iter()
        .filter_map(|(v, _)| *v)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    let range = hi - lo;
    columns
        .iter()
        .map(|(v, interpolated)| match v {
            None => ' ',
            Some(_) if *interpolated => '·',
            Some(v) => {
                let f = if range > 0.0 { (v - lo) / range } else { 0.5 };
                SPARKS[((f * (SPARKS.len() - 1) as f64).round() as usize).min(SPARKS.len() - 1)]
            }
        })
        .collect()
}
