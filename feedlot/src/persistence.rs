//! Persistence: binary snapshots of the whole registry, timestamped
//! backups, and tabular CSV exports.
//!
//! The snapshot layout is an implementation-owned format, not a
//! compatibility contract; a version byte guards against loading foreign
//! files.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::alerts::AlertRecord;
use crate::animal::Animal;
use crate::error::FeedlotError;
use crate::pen::Pen;
use crate::registry::{FeedlotRegistry, SharedRegistry};
use crate::report::{AnimalSummary, DailyReport};

pub const SNAPSHOT_VERSION: u8 = 1;

/// Complete registry state for save/restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u8,
    pub saved_at: DateTime<Utc>,
    pub day: u32,
    pub animals: Vec<Animal>,
    pub pens: Vec<Pen>,
    pub alerts: Vec<AlertRecord>,
}

/// Capture the registry's current state. Animal locks are taken one at a
/// time, so sensors keep running while a snapshot is cut.
pub fn snapshot(registry: &SharedRegistry) -> Snapshot {
    let animals = registry
        .animals()
        .iter()
        .map(|animal| animal.lock().unwrap().clone())
        .collect();
    Snapshot {
        version: SNAPSHOT_VERSION,
        saved_at: Utc::now(),
        day: registry.day(),
        animals,
        pens: registry.pens(),
        alerts: registry.alert_log().all(),
    }
}

/// Serialize the registry to a binary snapshot file.
pub fn save_snapshot(registry: &SharedRegistry, path: &Path) -> Result<(), FeedlotError> {
    let snap = snapshot(registry);
    let bytes = bincode::serialize(&snap)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    info!(
        "snapshot saved to {} (day {}, {} animals)",
        path.display(),
        snap.day,
        snap.animals.len()
    );
    Ok(())
}

/// Read a snapshot file back, rejecting unknown versions.
pub fn load_snapshot(path: &Path) -> Result<Snapshot, FeedlotError> {
    let bytes = fs::read(path)?;
    let snap: Snapshot = bincode::deserialize(&bytes)?;
    if snap.version != SNAPSHOT_VERSION {
        return Err(FeedlotError::UnsupportedSnapshotVersion(snap.version));
    }
    info!(
        "snapshot loaded from {} (day {}, {} animals)",
        path.display(),
        snap.day,
        snap.animals.len()
    );
    Ok(snap)
}

/// Rebuild a registry from a snapshot: pens keep their capacities, each
/// animal returns to the pen that held it, the day counter and alert log
/// are restored.
pub fn restore(snap: Snapshot) -> Result<SharedRegistry, FeedlotError> {
    let registry = FeedlotRegistry::new();

    let pen_of: Vec<(u32, Vec<u32>)> = snap
        .pens
        .iter()
        .map(|pen| (pen.number(), pen.animal_ids().to_vec()))
        .collect();
    for pen in snap.pens {
        registry.add_pen(pen);
    }

    for animal in snap.animals {
        let id = animal.id();
        let pen_number = pen_of
            .iter()
            .find(|(_, ids)| ids.contains(&id))
            .map(|(number, _)| *number)
            .unwrap_or(1);
        registry.add_animal(animal, pen_number)?;
    }

    registry.set_day(snap.day);
    registry.alert_log().restore(snap.alerts);
    Ok(registry)
}

/// The most recent `.dat` snapshot in a directory, if any. Filenames
/// embed a sortable timestamp, so the lexicographic maximum is the
/// newest file.
pub fn latest_snapshot(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().map(|ext| ext == "dat").unwrap_or(false)
        })
        .max()
}

fn timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Save a timestamped snapshot under `<dir>`.
pub fn save_timestamped(registry: &SharedRegistry, dir: &Path) -> Result<PathBuf, FeedlotError> {
    let path = dir.join(format!("feedlot_{}.dat", timestamp()));
    save_snapshot(registry, &path)?;
    Ok(path)
}

/// Save a backup snapshot under `<dir>/backups`.
pub fn backup(registry: &SharedRegistry, dir: &Path) -> Result<PathBuf, FeedlotError> {
    let path = dir.join("backups").join(format!("backup_{}.dat", timestamp()));
    save_snapshot(registry, &path)?;
    Ok(path)
}

/// Export one summary row per animal.
pub fn export_summary_csv(registry: &SharedRegistry, path: &Path) -> Result<(), FeedlotError> {
    let day = registry.day();
    let mut out = String::from(
        "id,category,weight_kg,initial_weight_kg,gain_kg,gain_per_day_kg,temperature_c,health,strategy,days_on_feed\n",
    );
    for animal in registry.animals() {
        let row = AnimalSummary::from_animal(&animal.lock().unwrap(), day);
        let _ = writeln!(
            out,
            "{},{},{:.2},{:.2},{:.2},{:.2},{:.1},{},{},{}",
            row.id,
            row.category,
            row.weight,
            row.initial_weight,
            row.total_gain,
            row.gain_per_day,
            row.temperature,
            row.health,
            row.strategy,
            row.days_on_feed
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, out)?;
    info!("summary exported to {}", path.display());
    Ok(())
}

/// Export the long-form reading history: one row per animal per reading
/// index, weight and temperature histories zipped to the shorter length.
pub fn export_history_csv(registry: &SharedRegistry, path: &Path) -> Result<(), FeedlotError> {
    let mut out = String::from("animal_id,category,reading,weight_kg,temperature_c\n");
    for animal in registry.animals() {
        let a = animal.lock().unwrap();
        for (index, (weight, temperature)) in a
            .weight_history()
            .iter()
            .zip(a.temperature_history().iter())
            .enumerate()
        {
            let _ = writeln!(
                out,
                "{},{},{},{:.2},{:.1}",
                a.id(),
                a.category(),
                index,
                weight,
                temperature
            );
        }
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, out)?;
    info!("history exported to {}", path.display());
    Ok(())
}

/// Dump a report snapshot as pretty JSON, for eyeballing a run.
pub fn export_report_json(report: &DailyReport, path: &Path) -> Result<(), FeedlotError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|err| FeedlotError::Persistence(err.to_string()))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertKind, AlertSink};
    use crate::animal::{Category, HealthStatus, SicknessCause};
    use crate::strategy::FeedingStrategy;
    use std::sync::Arc;

    fn populated_registry() -> SharedRegistry {
        let registry = FeedlotRegistry::new();
        registry.add_pen(Pen::with_capacity(1, 10));
        registry.add_pen(Pen::with_capacity(2, 4));

        let a1 = registry
            .add_animal(Animal::new(1, Category::Young, 180.0), 1)
            .unwrap();
        {
            let mut a = a1.lock().unwrap();
            a.record_gain(1.2);
            a.record_temperature(39.7);
            FeedingStrategy::Intensive.apply(&mut a);
        }
        registry
            .add_animal(Animal::new(2, Category::Adult, 450.0), 2)
            .unwrap();
        registry.set_day(4);
        registry
    }

    #[test]
    fn snapshot_round_trip_preserves_everything() {
        let registry = populated_registry();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.dat");

        save_snapshot(&registry, &path).unwrap();
        let restored = restore(load_snapshot(&path).unwrap()).unwrap();

        assert_eq!(restored.day(), 4);
        assert_eq!(restored.animal_count(), 2);
        assert_eq!(restored.pen_count(), 2);
        assert_eq!(restored.pen(2).unwrap().capacity(), 4);
        assert!(restored.pen(1).unwrap().contains(1));

        let original = registry.animal(1).unwrap();
        let copy = restored.animal(1).unwrap();
        let (original, copy) = (original.lock().unwrap(), copy.lock().unwrap());
        assert_eq!(copy.weight(), original.weight());
        assert_eq!(copy.initial_weight(), original.initial_weight());
        assert_eq!(copy.temperature(), original.temperature());
        assert_eq!(copy.health(), original.health());
        assert_eq!(copy.strategy_label(), original.strategy_label());
        assert_eq!(copy.weight_history(), original.weight_history());
        assert_eq!(copy.temperature_history(), original.temperature_history());
        assert_eq!(
            copy.health(),
            HealthStatus::Sick(SicknessCause::Fever)
        );
    }

    #[test]
    fn missing_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_snapshot(&dir.path().join("absent.dat")).unwrap_err();
        assert!(matches!(err, FeedlotError::Persistence(_)));
    }

    #[test]
    fn latest_snapshot_picks_the_newest_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("feedlot_20250101_000000.dat"), b"x").unwrap();
        fs::write(dir.path().join("feedlot_20250601_120000.dat"), b"y").unwrap();
        fs::write(dir.path().join("notes.txt"), b"z").unwrap();

        let latest = latest_snapshot(dir.path()).unwrap();
        assert!(latest.ends_with("feedlot_20250601_120000.dat"));

        assert!(latest_snapshot(&dir.path().join("empty")).is_none());
    }

    #[test]
    fn backup_lands_under_backups() {
        let registry = populated_registry();
        let dir = tempfile::tempdir().unwrap();
        let path = backup(&registry, dir.path()).unwrap();
        assert!(path.starts_with(dir.path().join("backups")));
        assert!(path.exists());
    }

    #[test]
    fn summary_csv_has_one_row_per_animal() {
        let registry = populated_registry();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");

        export_summary_csv(&registry, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,category"));
        assert!(lines[1].starts_with("1,Young,"));
        assert!(lines[2].starts_with("2,Adult,"));
    }

    #[test]
    fn history_csv_has_one_row_per_reading() {
        let registry = populated_registry();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        export_history_csv(&registry, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        // Animal 1 has 4 weight entries but only 2 temperature entries
        // (zipped to 2); animal 2 has 1 of each; plus the header.
        assert_eq!(text.lines().count(), 1 + 2 + 1);
    }

    #[test]
    fn restore_preserves_alert_log() {
        let registry = populated_registry();
        let animal = registry.animal(1).unwrap();
        registry.alert_log().notify(
            &Arc::clone(&animal),
            "fever detected on animal #1: 39.7 C",
            AlertKind::Fever,
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.dat");
        save_snapshot(&registry, &path).unwrap();
        let restored = restore(load_snapshot(&path).unwrap()).unwrap();

        assert_eq!(restored.alert_log().count(), 1);
        assert_eq!(restored.alert_log().count_for_kind(AlertKind::Fever), 1);
    }
}
