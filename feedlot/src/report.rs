//! Report scheduler: advances the simulation day and aggregates feedlot
//! statistics into snapshots for external writers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::animal::Animal;
use crate::registry::SharedRegistry;
use crate::runner::PeriodicTask;

pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(15);

/// How many top gainers a report lists.
pub const TOP_GAINERS: usize = 3;

/// Aggregate statistics over every registered animal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedlotStats {
    pub day: u32,
    pub total_animals: usize,
    pub mean_weight: f64,
    pub total_weight: f64,
    pub mean_gain: f64,
    pub total_gain: f64,
    pub sick_count: usize,
    pub sick_pct: f64,
    pub pen_count: usize,
    pub alert_count: usize,
}

/// One animal's row in a report or tabular export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimalSummary {
    pub id: u32,
    pub category: String,
    pub weight: f64,
    pub initial_weight: f64,
    pub total_gain: f64,
    pub gain_per_day: f64,
    pub temperature: f64,
    pub health: String,
    pub strategy: String,
    pub days_on_feed: u32,
}

impl AnimalSummary {
    pub fn from_animal(animal: &Animal, day: u32) -> Self {
        Self {
            id: animal.id(),
            category: animal.category().to_string(),
            weight: animal.weight(),
            initial_weight: animal.initial_weight(),
            total_gain: animal.total_gain(),
            gain_per_day: animal.gain_per_day(day.max(1)),
            temperature: animal.temperature(),
            health: animal.health().to_string(),
            strategy: animal
                .strategy_label()
                .unwrap_or("Unassigned")
                .to_string(),
            days_on_feed: animal.days_on_feed(),
        }
    }
}

/// Snapshot handed to the report sink on every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub generated_at: DateTime<Utc>,
    pub stats: FeedlotStats,
    pub top_gainers: Vec<AnimalSummary>,
}

/// Compute aggregate statistics from the registry's current state.
pub fn collect_stats(registry: &SharedRegistry) -> FeedlotStats {
    let animals = registry.animals();
    let day = registry.day();
    let mut stats = FeedlotStats {
        day,
        total_animals: animals.len(),
        pen_count: registry.pen_count(),
        alert_count: registry.alert_log().count(),
        ..FeedlotStats::default()
    };
    if animals.is_empty() {
        return stats;
    }

    for animal in &animals {
        let a = animal.lock().unwrap();
        stats.total_weight += a.weight();
        stats.total_gain += a.total_gain();
        if a.is_sick() {
            stats.sick_count += 1;
        }
    }
    let count = animals.len() as f64;
    stats.mean_weight = stats.total_weight / count;
    stats.mean_gain = stats.total_gain / count;
    stats.sick_pct = stats.sick_count as f64 / count * 100.0;
    stats
}

/// Build a full report from the registry's current state.
pub fn build_report(registry: &SharedRegistry) -> DailyReport {
    let stats = collect_stats(registry);
    let day = stats.day;
    let top_gainers = registry
        .top_gainers(TOP_GAINERS)
        .iter()
        .map(|animal| AnimalSummary::from_animal(&animal.lock().unwrap(), day))
        .collect();
    DailyReport {
        generated_at: Utc::now(),
        stats,
        top_gainers,
    }
}

/// The bundled sink: a few log lines per report.
pub fn log_report(report: &DailyReport) {
    let stats = &report.stats;
    info!(
        "day {} report: {} animals, mean {:.1} kg, gain {:.1} kg total, {} sick ({:.0}%), {} alerts",
        stats.day,
        stats.total_animals,
        stats.mean_weight,
        stats.total_gain,
        stats.sick_count,
        stats.sick_pct,
        stats.alert_count
    );
    for (rank, top) in report.top_gainers.iter().enumerate() {
        info!(
            "  top {}: animal #{} +{:.2} kg ({:.2} kg/day)",
            rank + 1,
            top.id,
            top.total_gain,
            top.gain_per_day
        );
    }
}

type ReportSink = Arc<dyn Fn(&DailyReport) + Send + Sync>;

/// Periodic actor that advances the day counter and publishes a report
/// snapshot to its sink on each tick.
pub struct ReportScheduler {
    registry: SharedRegistry,
    interval: Duration,
    sink: ReportSink,
    task: PeriodicTask,
}

impl ReportScheduler {
    pub fn new(registry: SharedRegistry) -> Self {
        Self::with_sink(registry, Arc::new(log_report))
    }

    pub fn with_sink(registry: SharedRegistry, sink: ReportSink) -> Self {
        Self {
            registry,
            interval: DEFAULT_REPORT_INTERVAL,
            sink,
            task: PeriodicTask::new("report-scheduler"),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start the reporting loop; starting twice is a no-op.
    pub fn start(&mut self) {
        let registry = Arc::clone(&self.registry);
        let sink = Arc::clone(&self.sink);
        self.task.start(self.interval, move || {
            report_tick(&registry, &sink);
        });
    }

    pub fn stop(&mut self) {
        self.task.stop();
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Run one tick by hand, exactly as the loop does.
    pub fn tick_now(&self) {
        report_tick(&self.registry, &self.sink);
    }

    /// A closing report without advancing the day.
    pub fn final_report(&self) -> DailyReport {
        build_report(&self.registry)
    }
}

fn report_tick(registry: &SharedRegistry, sink: &ReportSink) {
    registry.advance_day();
    for animal in registry.animals() {
        animal.lock().unwrap().advance_day();
    }
    let report = build_report(registry);
    sink(&report);
}
