//! The dashboard: polls the API and keeps a [View] up to date.
//!
//! Startup loads every section in turn. After that, two independent timers
//! refresh the readings (current conditions and neighbors) and the history
//! chart, and typed [Command]s switch metric or period or reload
//! everything. Each refresh runs as its own task: a slow one never holds
//! up the other timer, refreshes are not deduplicated, and the view shows
//! whatever arrived last.

use std::{io::BufRead, str::FromStr, sync::Arc, time::Duration};

use clap::ValueEnum;
use tokio::{
    sync::mpsc,
    task::JoinSet,
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::{
    context::Context,
    history::Period,
    jokes::FALLBACK_JOKE,
    models::{CurrentResponse, HistoryResponse, Metric, NearbyResponse},
    stats,
};

pub mod client;
pub mod view;

use client::{DashboardApi, FetchError};
use view::{BandSource, ChartPoint, HistoryChart, Panel, Section, View};

/// Refresh intervals for the two timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timers {
    /// Current conditions and nearby sensors.
    pub readings: Duration,
    /// The history chart.
    pub history: Duration,
}

impl Default for Timers {
    fn default() -> Self {
        Timers {
            readings: Duration::from_secs(5 * 60),
            history: Duration::from_secs(15 * 60),
        }
    }
}

/// Something the user asked the running dashboard to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `r`: reload every section.
    Refresh,
    /// `m <metric>`: chart another metric from the cached history.
    Metric(Metric),
    /// `p <period>`: fetch and chart another window.
    Period(Period),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command {0:?}; try `r`, `m aqi|temperature|humidity` or `p 24h|7d|30d`")]
pub struct InvalidCommand(String);

impl FromStr for Command {
    type Err = InvalidCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidCommand(s.trim().to_string());
        let mut words = s.split_whitespace();
        let command = match (words.next(), words.next()) {
            (Some("r" | "refresh"), None) => Command::Refresh,
            (Some("m" | "metric"), Some(m)) => {
                Command::Metric(<Metric as ValueEnum>::from_str(m, true).map_err(|_| invalid())?)
            }
            (Some("p" | "period"), Some(p)) => Command::Period(p.parse().map_err(|_| invalid())?),
            _ => return Err(invalid()),
        };
        if words.next().is_some() {
            return Err(invalid());
        }
        Ok(command)
    }
}

/// Read one [Command] per line from `input` on a separate thread.
///
/// Blank lines are skipped and bad ones logged. The channel closes at the
/// end of the input, or once the receiver is gone.
pub fn read_commands<R>(input: R) -> mpsc::Receiver<Command>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(8);
    std::thread::spawn(move || {
        for line in input.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("could not read command: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(command) => {
                    if tx.blocking_send(command).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }
    });
    rx
}

/// Fetched data, ready to show.
enum Update {
    Readings(
        Result<CurrentResponse, FetchError>,
        Result<NearbyResponse, FetchError>,
    ),
    History(Result<HistoryResponse, FetchError>),
    All {
        current: Result<CurrentResponse, FetchError>,
        history: Result<HistoryResponse, FetchError>,
        nearby: Result<NearbyResponse, FetchError>,
        joke: Result<String, FetchError>,
    },
}

async fn fetch_readings<A: DashboardApi>(api: Arc<A>) -> Update {
    let (current, nearby) = tokio::join!(api.current(), api.nearby());
    Update::Readings(current, nearby)
}

async fn fetch_history<A: DashboardApi>(api: Arc<A>, period: Period) -> Update {
    Update::History(api.history(period).await)
}

async fn fetch_all<A: DashboardApi>(api: Arc<A>, period: Period) -> Update {
    let (current, history, nearby, joke) = tokio::join!(
        api.current(),
        api.history(period),
        api.nearby(),
        api.joke(),
    );
    Update::All {
        current,
        history,
        nearby,
        joke,
    }
}

/// Dashboard controller.
pub struct Dashboard<A, V> {
    api: Arc<A>,
    view: V,
    period: Period,
    metric: Metric,
    /// Last history fetched, for re-rendering under a different metric.
    history: Option<HistoryResponse>,
}

impl<A, V> Dashboard<A, V>
where
    A: DashboardApi + 'static,
    V: View,
{
    pub fn new(api: A, view: V, period: Period, metric: Metric) -> Self {
        Dashboard {
            api: Arc::new(api),
            view,
            period,
            metric,
            history: None,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn into_view(self) -> V {
        self.view
    }

    /// Load every section, one after another.
    pub async fn start(&mut self) {
        let current = self.api.current().await;
        self.show_current(current);
        let history = self.api.history(self.period).await;
        self.show_history(history);
        let nearby = self.api.nearby().await;
        self.show_nearby(nearby);
        let joke = self.api.joke().await;
        self.show_joke(joke);
        self.flush();
    }

    /// Reload every section concurrently.
    pub async fn refresh_all(&mut self) {
        let update = fetch_all(self.api.clone(), self.period).await;
        self.apply(update);
    }

    /// Reload current conditions and nearby sensors.
    pub async fn refresh_readings(&mut self) {
        let update = fetch_readings(self.api.clone()).await;
        self.apply(update);
    }

    pub async fn refresh_history(&mut self) {
        let update = fetch_history(self.api.clone(), self.period).await;
        self.apply(update);
    }

    /// Chart a different metric from the cached history.
    pub fn select_metric(&mut self, metric: Metric) {
        self.metric = metric;
        if let Some(h) = &self.history {
            let chart = chart(h, self.metric);
            self.view.render(Panel::History(chart));
            self.flush();
        }
    }

    /// Switch to, and fetch, a different history window.
    pub async fn select_period(&mut self, period: Period) {
        self.period = period;
        self.refresh_history().await;
    }

    /// Run both refresh timers, and whatever `commands` asks for, until the
    /// context is cancelled. Fetches still in flight then are dropped.
    pub async fn run(
        &mut self,
        ctx: &Context,
        timers: Timers,
        mut commands: mpsc::Receiver<Command>,
    ) {
        let mut readings = interval_at(Instant::now() + timers.readings, timers.readings);
        let mut history = interval_at(Instant::now() + timers.history, timers.history);
        readings.set_missed_tick_behavior(MissedTickBehavior::Delay);
        history.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut fetches = JoinSet::new();
        let mut input_open = true;
        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = readings.tick() => {
                    tracing::info!("refreshing readings");
                    fetches.spawn(fetch_readings(self.api.clone()));
                }
                _ = history.tick() => {
                    tracing::info!("refreshing {} history", self.period);
                    fetches.spawn(fetch_history(self.api.clone(), self.period));
                }
                command = commands.recv(), if input_open => match command {
                    Some(command) => self.command(command, &mut fetches),
                    None => input_open = false,
                },
                Some(done) = fetches.join_next() => match done {
                    Ok(update) => self.apply(update),
                    Err(e) => tracing::error!("refresh task failed: {}", e),
                },
            }
        }
        fetches.abort_all();
    }

    fn command(&mut self, command: Command, fetches: &mut JoinSet<Update>) {
        tracing::info!("command: {:?}", command);
        match command {
            Command::Refresh => {
                fetches.spawn(fetch_all(self.api.clone(), self.period));
            }
            Command::Metric(metric) => self.select_metric(metric),
            Command::Period(period) => {
                self.period = period;
                fetches.spawn(fetch_history(self.api.clone(), period));
            }
        }
    }

    fn apply(&mut self, update: Update) {
        match update {
            Update::Readings(current, nearby) => {
                self.show_current(current);
                self.show_nearby(nearby);
            }
            Update::History(history) => self.show_history(history),
            Update::All {
                current,
                history,
                nearby,
                joke,
            } => {
                self.show_current(current);
                self.show_history(history);
                self.show_nearby(nearby);
                self.show_joke(joke);
            }
        }
        self.flush();
    }

    fn show_current(&mut self, result: Result<CurrentResponse, FetchError>) {
        match result {
            Ok(c) => self.view.render(Panel::Current(Box::new(c))),
            Err(e) => {
                tracing::warn!("could not load current readings: {}", e);
                self.view.render(Panel::Unavailable(Section::Current));
            }
        }
    }

    fn show_history(&mut self, result: Result<HistoryResponse, FetchError>) {
        match result {
            Ok(h) => {
                self.view.render(Panel::History(chart(&h, self.metric)));
                self.history = Some(h);
            }
            Err(e) => {
                tracing::warn!("could not load {} history: {}", self.period, e);
                self.view.render(Panel::Unavailable(Section::History));
            }
        }
    }

    fn show_nearby(&mut self, result: Result<NearbyResponse, FetchError>) {
        match result {
            Ok(n) => self.view.render(Panel::Nearby(n.sensors)),
            Err(e) => {
                tracing::warn!("could not load nearby sensors: {}", e);
                self.view.render(Panel::Unavailable(Section::Nearby));
            }
        }
    }

    fn show_joke(&mut self, result: Result<String, FetchError>) {
        let joke = result.unwrap_or_else(|e| {
            tracing::warn!("could not load joke: {}", e);
            FALLBACK_JOKE.to_string()
        });
        self.view.render(Panel::Joke(joke));
    }

    fn flush(&mut self) {
        if let Err(e) = self.view.flush() {
            tracing::error!("could not draw dashboard: {}", e);
        }
    }
}

/// Build the chart of one metric from a history response.
///
/// Uses the server's IQR bands when it sent them; otherwise estimates a
/// single band over the whole series. Interpolated points are drawn but
/// left out of the summary and the estimated band.
pub fn chart(history: &HistoryResponse, metric: Metric) -> HistoryChart {
    let points: Vec<ChartPoint> = history
        .data
        .iter()
        .map(|p| ChartPoint {
            timestamp: p.timestamp,
            value: metric.value(p),
            color: p.color.clone(),
            interpolated: p.interpolated,
        })
        .collect();
    let values: Vec<f64> = points
        .iter()
        .filter(|p| !p.interpolated)
        .filter_map(|p| p.value)
        .collect();

    let server_bands = history
        .iqr
        .as_ref()
        .map(|iqr| metric.bands(iqr))
        .filter(|b| b.len() == points.len());
    let (bands, band_source) = match server_bands {
        Some(b) => (b.to_vec(), BandSource::Server),
        None => {
            let band = stats::quartiles_fallback(&values);
            let bands = match band {
                Some(q) => vec![Some(q); points.len()],
                None => Vec::new(),
            };
            (bands, BandSource::Estimated)
        }
    };

    HistoryChart {
        period: history.period.parse().unwrap_or_default(),
        metric,
        summary: stats::summarize(&values),
        points,
        bands,
        band_source,
        cigarettes_per_day: history.cigarettes_per_day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{AqiReport, HistoryPoint, Location, MetricBands, Readings},
        stats::Quartiles,
    };
    use async_trait::async_trait;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    /// Canned API; counts history fetches.
    #[derive(Default)]
    struct FakeApi {
        history: Option<HistoryResponse>,
        /// How long each history fetch takes.
        history_delay: Duration,
        history_calls: AtomicUsize,
        periods: Mutex<Vec<Period>>,
    }

    fn unavailable() -> FetchError {
        FetchError::Status {
            status: 500,
            detail: "down".to_string(),
        }
    }

    #[async_trait]
    impl DashboardApi for FakeApi {
        async fn current(&self) -> Result<CurrentResponse, FetchError> {
            Ok(CurrentResponse {
                sensor_id: 1,
                name: "Porch".to_string(),
                location: Location {
                    latitude: None,
                    longitude: None,
                    altitude: None,
                },
                model: None,
                firmware: None,
                last_seen: None,
                last_seen_formatted: None,
                readings: Readings {
                    pm25_raw: 5.0,
                    pm25_corrected: 5.5,
                    pm1: 0.0,
                    pm10: 0.0,
                    temperature_f: None,
                    temperature_c: None,
                    humidity: None,
                    pressure: 0.0,
                },
                aqi: AqiReport {
                    value: 23,
                    category: "Good".to_string(),
                    color: "#00e400".to_string(),
                    message: String::new(),
                    cigarettes: 0.25,
                },
                confidence: 100.0,
                channel_state: None,
                timestamp: None,
            })
        }

        async fn history(&self, period: Period) -> Result<HistoryResponse, FetchError> {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            self.periods.lock().unwrap().push(period);
            tokio::time::sleep(self.history_delay).await;
            self.history.clone().ok_or_else(unavailable)
        }

        async fn nearby(&self) -> Result<NearbyResponse, FetchError> {
            Err(unavailable())
        }

        async fn joke(&self) -> Result<String, FetchError> {
            Err(unavailable())
        }
    }

    /// Records every panel and flush.
    #[derive(Default, Clone)]
    struct RecordingView {
        panels: Arc<Mutex<Vec<Panel>>>,
        flushes: Arc<AtomicUsize>,
    }

    impl View for RecordingView {
        fn render(&mut self, panel: Panel) {
            self.panels.lock().unwrap().push(panel);
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl RecordingView {
        fn panels(&self) -> Vec<Panel> {
            self.panels.lock().unwrap().clone()
        }

        fn charts(&self) -> Vec<HistoryChart> {
            self.panels()
                .into_iter()
                .filter_map(|p| match p {
                    Panel::History(h) => Some(h),
                    _ => None,
                })
                .collect()
        }

        fn last_chart(&self) -> Option<HistoryChart> {
            self.charts().pop()
        }

        fn count(&self, f: impl Fn(&Panel) -> bool) -> usize {
            self.panels().iter().filter(|p| f(p)).count()
        }
    }

    fn point(ts: i64, aqi: u32, temperature: Option<f64>, interpolated: bool) -> HistoryPoint {
        HistoryPoint {
            timestamp: ts,
            datetime: None,
            pm25: 0.0,
            pm25_raw: None,
            humidity: None,
            temperature,
            aqi,
            category: "Good".to_string(),
            color: "#00e400".to_string(),
            interpolated,
        }
    }

    fn history(aqis: &[u32]) -> HistoryResponse {
        let data: Vec<HistoryPoint> = aqis
            .iter()
            .enumerate()
            .map(|(i, a)| point(i as i64 * 600, *a, Some(60.0 + i as f64), false))
            .collect();
        HistoryResponse {
            sensor_id: 1,
            period: "24h".to_string(),
            average_minutes: Some(10),
            data_points: data.len(),
            data,
            iqr: None,
            stats: None,
            cigarettes_per_day: Some(0.5),
        }
    }

    #[test]
    fn chart_estimates_band_without_server_iqr() {
        let h = history(&[10, 20, 30, 40]);
        let c = chart(&h, Metric::Aqi);
        assert_eq!(c.band_source, BandSource::Estimated);
        assert_eq!(c.bands.len(), 4);
        assert_eq!(c.bands[0], Some(Quartiles { q1: 20.0, q3: 40.0 }));

        let s = c.summary.expect("summary");
        assert_eq!(s.avg, 25.0);
        assert_eq!(s.min, 10.0);
        assert_eq!(s.max, 40.0);
        assert_eq!(c.cigarettes_per_day, Some(0.5));
        assert_eq!(c.period, Period::Day);
    }

    #[test]
    fn chart_prefers_server_iqr() {
        let mut h = history(&[10, 20, 30, 40]);
        let band = Some(Quartiles { q1: 1.0, q3: 2.0 });
        h.iqr = Some(MetricBands {
            aqi: vec![band; 4],
            temperature: vec![None; 4],
            humidity: vec![None; 4],
        });
        let c = chart(&h, Metric::Aqi);
        assert_eq!(c.band_source, BandSource::Server);
        assert_eq!(c.bands, vec![band; 4]);

        let c = chart(&h, Metric::Temperature);
        assert_eq!(c.band_source, BandSource::Server);
        assert_eq!(c.summary.map(|s| s.max), Some(63.0));
    }

    #[test]
    fn chart_summary_ignores_zero_and_missing() {
        let mut h = history(&[0, 30, 60]);
        h.data[1].temperature = None;
        let c = chart(&h, Metric::Aqi);
        assert_eq!(c.summary.map(|s| s.avg), Some(45.0));
        assert_eq!(c.points[0].value, Some(0.0));

        let c = chart(&h, Metric::Humidity);
        assert_eq!(c.summary, None);
        assert!(c.bands.is_empty());
    }

    #[tokio::test]
    async fn start_renders_placeholders_for_failures() {
        let view = RecordingView::default();
        let mut d = Dashboard::new(FakeApi::default(), view.clone(), Period::Day, Metric::Aqi);
        d.start().await;

        let panels = view.panels();
        assert!(matches!(panels[0], Panel::Current(_)));
        assert_eq!(panels[1], Panel::Unavailable(Section::History));
        assert_eq!(panels[2], Panel::Unavailable(Section::Nearby));
        assert_eq!(panels[3], Panel::Joke(FALLBACK_JOKE.to_string()));
        assert_eq!(view.flushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn metric_toggle_uses_cache() {
        let api = FakeApi {
            history: Some(history(&[10, 20, 30, 40])),
            ..Default::default()
        };
        let view = RecordingView::default();
        let mut d = Dashboard::new(api, view.clone(), Period::Day, Metric::Aqi);
        d.refresh_all().await;
        assert_eq!(d.api.history_calls.load(Ordering::SeqCst), 1);

        d.select_metric(Metric::Temperature);
        assert_eq!(d.api.history_calls.load(Ordering::SeqCst), 1);
        let c = view.last_chart().expect("chart rendered");
        assert_eq!(c.metric, Metric::Temperature);
        assert_eq!(c.summary.map(|s| s.min), Some(60.0));
    }

    #[tokio::test]
    async fn period_change_fetches() {
        let api = FakeApi {
            history: Some(history(&[10])),
            ..Default::default()
        };
        let mut d = Dashboard::new(api, RecordingView::default(), Period::Day, Metric::Aqi);
        d.select_period(Period::Month).await;
        assert_eq!(*d.api.periods.lock().unwrap(), vec![Period::Month]);
    }

    #[test]
    fn chart_skips_interpolated_points() {
        let mut h = history(&[10, 20, 30, 40]);
        h.data.insert(2, point(900, 200, Some(99.0), true));
        let c = chart(&h, Metric::Aqi);
        assert_eq!(c.points.len(), 5);
        assert!(c.points[2].interpolated);
        assert_eq!(c.bands, vec![Some(Quartiles { q1: 20.0, q3: 40.0 }); 5]);

        let s = c.summary.expect("summary");
        assert_eq!(s.avg, 25.0);
        assert_eq!(s.max, 40.0);
    }

    #[test]
    fn parses_commands() {
        assert_eq!("r".parse::<Command>(), Ok(Command::Refresh));
        assert_eq!("refresh".parse::<Command>(), Ok(Command::Refresh));
        assert_eq!(
            "m temperature".parse::<Command>(),
            Ok(Command::Metric(Metric::Temperature))
        );
        assert_eq!(
            "metric HUMIDITY".parse::<Command>(),
            Ok(Command::Metric(Metric::Humidity))
        );
        assert_eq!(
            "  p   30d ".parse::<Command>(),
            Ok(Command::Period(Period::Month))
        );
        for bad in ["", "x", "m", "m pm10", "p 1y", "r now", "p 7d 24h"] {
            assert!(bad.parse::<Command>().is_err(), "{bad:?} should not parse");
        }
    }

    #[tokio::test]
    async fn reads_commands_line_by_line() {
        let input = std::io::Cursor::new("r\n\nbogus\nm humidity\np 7d\n");
        let mut commands = read_commands(input);
        assert_eq!(commands.recv().await, Some(Command::Refresh));
        assert_eq!(commands.recv().await, Some(Command::Metric(Metric::Humidity)));
        assert_eq!(commands.recv().await, Some(Command::Period(Period::Week)));
        assert_eq!(commands.recv().await, None);
    }

    /// Cancels the context after `after`.
    async fn cancel_after(ctx: &Context, after: Duration) {
        tokio::time::sleep(after).await;
        ctx.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn timers_fire_independently() {
        let api = FakeApi {
            history: Some(history(&[10])),
            ..Default::default()
        };
        let view = RecordingView::default();
        let mut d = Dashboard::new(api, view.clone(), Period::Day, Metric::Aqi);
        let ctx = Context::new();
        let timers = Timers {
            readings: Duration::from_secs(60),
            history: Duration::from_secs(150),
        };
        let (_input, commands) = mpsc::channel(1);

        tokio::join!(
            d.run(&ctx, timers, commands),
            cancel_after(&ctx, Duration::from_secs(310))
        );

        // Readings at 60..=300 s, history at 150 and 300 s.
        assert_eq!(d.api.history_calls.load(Ordering::SeqCst), 2);
        assert_eq!(view.count(|p| matches!(p, Panel::Current(_))), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_history_does_not_hold_up_readings_or_shutdown() {
        let api = FakeApi {
            history: Some(history(&[10])),
            history_delay: Duration::from_secs(60),
            ..Default::default()
        };
        let view = RecordingView::default();
        let mut d = Dashboard::new(api, view.clone(), Period::Day, Metric::Aqi);
        let ctx = Context::new();
        let timers = Timers {
            readings: Duration::from_secs(10),
            history: Duration::from_secs(5),
        };
        let (_input, commands) = mpsc::channel(1);

        let started = Instant::now();
        tokio::join!(
            d.run(&ctx, timers, commands),
            cancel_after(&ctx, Duration::from_secs(27))
        );
        assert!(started.elapsed() < Duration::from_secs(28));

        // History fetches started at 5..=25 s and none finished; readings
        // still landed at 10 and 20 s.
        assert_eq!(d.api.history_calls.load(Ordering::SeqCst), 5);
        assert!(view.charts().is_empty());
        assert_eq!(view.count(|p| matches!(p, Panel::Current(_))), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_switch_metric_period_and_refresh() {
        let api = FakeApi {
            history: Some(history(&[10, 20, 30, 40])),
            ..Default::default()
        };
        let view = RecordingView::default();
        let mut d = Dashboard::new(api, view.clone(), Period::Day, Metric::Aqi);
        d.start().await;

        let (input, commands) = mpsc::channel(4);
        for command in [
            Command::Metric(Metric::Temperature),
            Command::Period(Period::Month),
            Command::Refresh,
        ] {
            input.send(command).await.expect("send");
        }
        drop(input);

        let ctx = Context::new();
        tokio::join!(
            d.run(&ctx, Timers::default(), commands),
            cancel_after(&ctx, Duration::from_secs(1))
        );

        // Start, then the period change and the refresh both fetch the new
        // window.
        assert_eq!(
            *d.api.periods.lock().unwrap(),
            vec![Period::Day, Period::Month, Period::Month]
        );
        // Start, the cached re-render, then one chart per fetch.
        let charts = view.charts();
        assert_eq!(charts.len(), 4);
        assert_eq!(charts[0].metric, Metric::Aqi);
        assert!(charts[1..].iter().all(|c| c.metric == Metric::Temperature));
        assert_eq!(view.count(|p| matches!(p, Panel::Joke(_))), 2);
    }
}
