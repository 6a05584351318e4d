//! Alert pipeline: sensors notify subscribed observers synchronously;
//! observers record alerts and react on the animal's health state.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::animal::{HealthStatus, SharedAnimal, SicknessCause};
use crate::error::FeedlotError;
use crate::registry::FeedlotRegistry;

/// Fever treatments are discharged once the temperature drops below this.
pub const FEVER_RECOVERY_BELOW: f64 = 39.0;

/// Hypothermia treatments are discharged once the temperature rises above this.
pub const HYPOTHERMIA_RECOVERY_ABOVE: f64 = 37.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    Fever,
    Hypothermia,
    LowGain,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::Fever => "FEVER",
            AlertKind::Hypothermia => "HYPOTHERMIA",
            AlertKind::LowGain => "LOW_GAIN",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emitted alert with the animal's state at emission time.
/// Immutable once created; the log is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub animal_id: u32,
    pub kind: AlertKind,
    pub message: String,
    pub weight: f64,
    pub temperature: f64,
    pub health: String,
}

/// Observer interface. Sensors call this synchronously, in registration
/// order, after releasing the animal lock; implementations may lock the
/// animal themselves.
pub trait AlertSink: Send + Sync {
    fn notify(&self, animal: &SharedAnimal, message: &str, kind: AlertKind);
}

#[derive(Default)]
struct AlertLogState {
    records: Vec<AlertRecord>,
    by_kind: HashMap<AlertKind, usize>,
    by_animal: HashMap<u32, usize>,
}

/// Generic alert log: records every alert, keeps per-kind and per-animal
/// counters, and applies a blunt automatic reaction (fever and hypothermia
/// readings put the animal under treatment on the spot).
#[derive(Default)]
pub struct AlertLog {
    state: Mutex<AlertLogState>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    pub fn count_for_kind(&self, kind: AlertKind) -> usize {
        self.state
            .lock()
            .unwrap()
            .by_kind
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    pub fn count_for_animal(&self, animal_id: u32) -> usize {
        self.state
            .lock()
            .unwrap()
            .by_animal
            .get(&animal_id)
            .copied()
            .unwrap_or(0)
    }

    /// The `n` most recent alerts, oldest first.
    pub fn recent(&self, n: usize) -> Vec<AlertRecord> {
        let state = self.state.lock().unwrap();
        let skip = state.records.len().saturating_sub(n);
        state.records[skip..].to_vec()
    }

    pub fn by_kind(&self, kind: AlertKind) -> Vec<AlertRecord> {
        let state = self.state.lock().unwrap();
        state
            .records
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    pub fn by_animal(&self, animal_id: u32) -> Vec<AlertRecord> {
        let state = self.state.lock().unwrap();
        state
            .records
            .iter()
            .filter(|r| r.animal_id == animal_id)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<AlertRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.records.clear();
        state.by_kind.clear();
        state.by_animal.clear();
    }

    /// Replace the log's contents, rebuilding counters from the records.
    /// Used when restoring a snapshot.
    pub fn restore(&self, records: Vec<AlertRecord>) {
        let mut state = self.state.lock().unwrap();
        state.by_kind.clear();
        state.by_animal.clear();
        for record in &records {
            *state.by_kind.entry(record.kind).or_insert(0) += 1;
            *state.by_animal.entry(record.animal_id).or_insert(0) += 1;
        }
        state.records = records;
    }

    /// Multi-line text summary: totals per kind and the most affected animals.
    pub fn summary(&self) -> String {
        let state = self.state.lock().unwrap();
        if state.records.is_empty() {
            return "no alerts recorded".to_string();
        }

        let mut out = format!("{} alerts recorded\n", state.records.len());
        let mut kinds: Vec<_> = state.by_kind.iter().collect();
        kinds.sort_by_key(|(kind, _)| kind.as_str());
        for (kind, count) in kinds {
            let _ = writeln!(out, "  {kind}: {count}");
        }

        let mut animals: Vec<_> = state.by_animal.iter().collect();
        animals.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        out.push_str("most affected:\n");
        for (id, count) in animals.into_iter().take(3) {
            let _ = writeln!(out, "  animal #{id}: {count} alert(s)");
        }
        out
    }

    /// Write the full log as text.
    pub fn export(&self, path: &Path) -> Result<(), FeedlotError> {
        let records = self.all();
        let mut out = String::new();
        for record in &records {
            let _ = writeln!(
                out,
                "{} [{}] animal #{} | {:.1} kg | {:.1} C | {} | {}",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.kind,
                record.animal_id,
                record.weight,
                record.temperature,
                record.health,
                record.message
            );
        }
        out.push_str(&self.summary());
        fs::write(path, out)?;
        Ok(())
    }
}

impl AlertSink for AlertLog {
    fn notify(&self, animal: &SharedAnimal, message: &str, kind: AlertKind) {
        // Snapshot state and apply the generic reaction under one animal lock.
        let record = {
            let mut a = animal.lock().unwrap();
            let record = AlertRecord {
                timestamp: Utc::now(),
                animal_id: a.id(),
                kind,
                message: message.to_string(),
                weight: a.weight(),
                temperature: a.temperature(),
                health: a.health().to_string(),
            };
            if !matches!(a.health(), HealthStatus::UnderTreatment(_)) {
                match kind {
                    AlertKind::Fever => {
                        a.set_health(HealthStatus::UnderTreatment(SicknessCause::Fever));
                    }
                    AlertKind::Hypothermia => {
                        a.set_health(HealthStatus::UnderTreatment(SicknessCause::Hypothermia));
                    }
                    AlertKind::LowGain => {}
                }
            }
            record
        };

        warn!("[{}] {}", kind, message);

        let mut state = self.state.lock().unwrap();
        *state.by_kind.entry(kind).or_insert(0) += 1;
        *state.by_animal.entry(record.animal_id).or_insert(0) += 1;
        state.records.push(record);
    }
}

/// An open treatment started by the health responder.
#[derive(Debug, Clone)]
pub struct Treatment {
    pub cause: SicknessCause,
    pub started_at: DateTime<Utc>,
    pub initial_temperature: f64,
    pub actions: &'static [&'static str],
}

const FEVER_ACTIONS: &[&str] = &[
    "isolate from the main herd",
    "administer antipyretic",
    "reinforce hydration",
    "monitor every 4 hours",
];

const HYPOTHERMIA_ACTIONS: &[&str] = &[
    "move to a sheltered pen",
    "provide thermal cover",
    "feed a high-energy ration",
    "monitor continuously",
];

/// Primary health observer: starts treatments on fever/hypothermia alerts
/// and flags low-gain animals for observation. Recovery is polled, never
/// timer-driven: callers must invoke the recovery check.
#[derive(Default)]
pub struct HealthResponder {
    treatments: Mutex<HashMap<u32, Treatment>>,
    applied: AtomicUsize,
}

impl HealthResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_treatment(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.treatments.lock().unwrap().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn treatment_for(&self, animal_id: u32) -> Option<Treatment> {
        self.treatments.lock().unwrap().get(&animal_id).cloned()
    }

    pub fn treatments_applied(&self) -> usize {
        self.applied.load(Ordering::Relaxed)
    }

    fn begin_treatment(&self, animal: &SharedAnimal, cause: SicknessCause) {
        let (id, temperature) = {
            let mut a = animal.lock().unwrap();
            a.set_health(HealthStatus::UnderTreatment(cause));
            (a.id(), a.temperature())
        };

        let mut treatments = self.treatments.lock().unwrap();
        if treatments.contains_key(&id) {
            // Already being treated; keep the original record.
            return;
        }
        let actions = match cause {
            SicknessCause::Fever => FEVER_ACTIONS,
            SicknessCause::Hypothermia => HYPOTHERMIA_ACTIONS,
        };
        treatments.insert(
            id,
            Treatment {
                cause,
                started_at: Utc::now(),
                initial_temperature: temperature,
                actions,
            },
        );
        drop(treatments);
        self.applied.fetch_add(1, Ordering::Relaxed);

        info!("treatment started for animal #{id} ({cause})");
        for action in actions {
            info!("  - {action}");
        }
    }

    /// Check one animal against the recovery thresholds and discharge it
    /// when met. Returns true if the animal recovered.
    pub fn check_recovery(&self, animal: &SharedAnimal) -> bool {
        let (id, temperature) = {
            let a = animal.lock().unwrap();
            (a.id(), a.temperature())
        };

        let recovered = {
            let treatments = self.treatments.lock().unwrap();
            match treatments.get(&id) {
                Some(t) => match t.cause {
                    SicknessCause::Fever => temperature < FEVER_RECOVERY_BELOW,
                    SicknessCause::Hypothermia => temperature > HYPOTHERMIA_RECOVERY_ABOVE,
                },
                None => false,
            }
        };
        if !recovered {
            return false;
        }

        animal.lock().unwrap().set_health(HealthStatus::Healthy);
        let treatment = self.treatments.lock().unwrap().remove(&id);
        if let Some(t) = treatment {
            let duration = Utc::now() - t.started_at;
            info!(
                "animal #{id} discharged ({}, treated {} min)",
                t.cause,
                duration.num_minutes()
            );
        }
        true
    }

    /// Sweep every registered animal; returns how many recovered.
    pub fn check_all(&self, registry: &FeedlotRegistry) -> usize {
        registry
            .animals()
            .iter()
            .filter(|animal| self.check_recovery(animal))
            .count()
    }
}

impl AlertSink for HealthResponder {
    fn notify(&self, animal: &SharedAnimal, _message: &str, kind: AlertKind) {
        match kind {
            AlertKind::Fever => self.begin_treatment(animal, SicknessCause::Fever),
            AlertKind::Hypothermia => self.begin_treatment(animal, SicknessCause::Hypothermia),
            AlertKind::LowGain => {
                let mut a = animal.lock().unwrap();
                if a.health() == HealthStatus::Healthy {
                    a.set_health(HealthStatus::UnderObservation);
                    info!("animal #{} placed under observation", a.id());
                }
            }
        }
    }
}
