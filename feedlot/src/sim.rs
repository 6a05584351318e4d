//! Run orchestration: build or restore a registry, wire up the periodic
//! actors, run for a bounded duration, then shut everything down in order
//! and flush the final report and exports.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::alerts::{AlertSink, HealthResponder};
use crate::animal::Category;
use crate::error::FeedlotError;
use crate::factory;
use crate::feeding::FeedingScheduler;
use crate::persistence;
use crate::registry::{FeedlotRegistry, SharedRegistry};
use crate::report::{log_report, ReportScheduler};
use crate::sensors::Sensor;
use crate::strategy::FeedingStrategy;

/// Reading interval for weight sensors.
pub const WEIGHT_SENSOR_INTERVAL: Duration = Duration::from_secs(8);

/// Reading interval for temperature sensors.
pub const TEMPERATURE_SENSOR_INTERVAL: Duration = Duration::from_secs(6);

/// How often the run loop polls treatments for recovery.
const RECOVERY_POLL: Duration = Duration::from_secs(30);

/// How often the run loop cuts a backup snapshot.
const BACKUP_INTERVAL: Duration = Duration::from_secs(40);

#[derive(Debug, Clone)]
pub struct SimConfig {
    /// How long the simulation runs.
    pub duration: Duration,
    /// Continue from the most recent snapshot in `data_dir`.
    pub resume: bool,
    /// Animals to seed when starting fresh.
    pub herd_size: usize,
    /// Where snapshots, backups and exports land.
    pub data_dir: PathBuf,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(60),
            resume: false,
            herd_size: 5,
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Seed a starting herd: a fixed mix of categories split over two pens,
/// mirroring a small working feedlot.
const SEED_HERD: &[(Category, f64)] = &[
    (Category::Young, 180.0),
    (Category::Growing, 280.0),
    (Category::Growing, 300.0),
    (Category::Adult, 450.0),
    (Category::Young, 200.0),
];

pub fn seed_herd(registry: &SharedRegistry, count: usize) -> Result<(), FeedlotError> {
    for index in 0..count {
        let id = index as u32 + 1;
        let animal = match SEED_HERD.get(index) {
            Some(&(category, weight)) => factory::create_animal(id, category, Some(weight)),
            None => {
                let category = match index % 3 {
                    0 => Category::Young,
                    1 => Category::Growing,
                    _ => Category::Adult,
                };
                factory::create_animal(id, category, None)
            }
        };
        let pen_number = if index < (count + 1) / 2 { 1 } else { 2 };
        registry.add_animal(animal, pen_number)?;
    }
    info!("seeded {count} animals over {} pens", registry.pen_count());
    Ok(())
}

/// Attach a weight and a temperature sensor to every registered animal.
/// Each sensor gets the shared health responder; the registry subscribes
/// its own alert log on registration.
pub fn attach_sensors(registry: &SharedRegistry, responder: &Arc<HealthResponder>) {
    for animal in registry.animals() {
        let mut weight = Sensor::weight(Arc::clone(&animal), WEIGHT_SENSOR_INTERVAL);
        weight.subscribe(Arc::clone(responder) as Arc<dyn AlertSink>);
        registry.add_sensor(weight);

        let mut temperature =
            Sensor::temperature(Arc::clone(&animal), TEMPERATURE_SENSOR_INTERVAL);
        temperature.subscribe(Arc::clone(responder) as Arc<dyn AlertSink>);
        registry.add_sensor(temperature);
    }
    info!("{} sensors attached", registry.sensor_count());
}

fn build_registry(config: &SimConfig) -> Result<SharedRegistry, FeedlotError> {
    if config.resume {
        if let Some(path) = persistence::latest_snapshot(&config.data_dir) {
            let registry = persistence::restore(persistence::load_snapshot(&path)?)?;
            info!("resumed from {} at day {}", path.display(), registry.day());
            return Ok(registry);
        }
        warn!("no snapshot found in {}, starting fresh", config.data_dir.display());
    }
    let registry = FeedlotRegistry::new();
    seed_herd(&registry, config.herd_size)?;
    Ok(registry)
}

/// Run a full simulation. Returns once every actor has been stopped and
/// the final report and exports have been flushed.
pub fn run(config: &SimConfig) -> Result<(), FeedlotError> {
    let registry = build_registry(config)?;
    let responder = Arc::new(HealthResponder::new());
    attach_sensors(&registry, &responder);

    let mut feeding = FeedingScheduler::new(Arc::clone(&registry));
    // A couple of opening assignments; the rest are auto-assigned on the
    // first feeding tick.
    if registry.animal(1).is_some() {
        feeding.assign(1, FeedingStrategy::Intensive);
    }
    if registry.animal(4).is_some() {
        feeding.assign(4, FeedingStrategy::Maintenance);
    }

    let mut reports = ReportScheduler::new(Arc::clone(&registry));

    registry.start_monitoring();
    feeding.start();
    reports.start();
    info!(
        "simulation running for {:?} ({} animals, {} pens)",
        config.duration,
        registry.animal_count(),
        registry.pen_count()
    );

    let started = Instant::now();
    let mut last_recovery = Instant::now();
    let mut last_backup = Instant::now();
    while started.elapsed() < config.duration {
        thread::sleep(Duration::from_secs(1).min(config.duration));

        if last_recovery.elapsed() >= RECOVERY_POLL {
            let recovered = responder.check_all(&registry);
            if recovered > 0 {
                info!("{recovered} animal(s) recovered this round");
            }
            feeding.optimize();
            last_recovery = Instant::now();
        }

        // A failed backup is reported and the run keeps going.
        if last_backup.elapsed() >= BACKUP_INTERVAL {
            if let Err(err) = persistence::backup(&registry, &config.data_dir) {
                warn!("backup failed: {err}");
            }
            last_backup = Instant::now();
        }
    }

    shutdown(&registry, &mut feeding, &mut reports, config);
    Ok(())
}

/// Orderly shutdown: stop every actor (each join bounded), then emit the
/// final report and flush exports. Export failures are logged, never
/// propagated; a run that ends always tries to leave its artifacts.
fn shutdown(
    registry: &SharedRegistry,
    feeding: &mut FeedingScheduler,
    reports: &mut ReportScheduler,
    config: &SimConfig,
) {
    info!("shutting down...");
    registry.stop_monitoring();
    feeding.stop();
    reports.stop();

    let final_report = reports.final_report();
    log_report(&final_report);

    let costs = feeding.ration_costs();
    info!(
        "ration costs: {} normal / {} intensive / {} maintenance, {:.0}/day total",
        costs.normal, costs.intensive, costs.maintenance, costs.total_daily_cost
    );

    let exports = [
        persistence::export_summary_csv(registry, &config.data_dir.join("summary.csv")),
        persistence::export_history_csv(registry, &config.data_dir.join("history.csv")),
        persistence::export_report_json(&final_report, &config.data_dir.join("final_report.json")),
        persistence::save_timestamped(registry, &config.data_dir).map(|_| ()),
    ];
    for result in exports {
        if let Err(err) = result {
            warn!("export failed: {err}");
        }
    }
    info!("simulation finished at day {}", registry.day());
}
