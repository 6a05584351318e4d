//! Animal entity: weight/temperature histories and the health state machine.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::FeedlotError;

/// Resting body temperature for cattle, also the seed of every history.
pub const NORMAL_TEMPERATURE: f64 = 38.5;

/// Readings at or above this are classified as fever.
pub const FEVER_THRESHOLD: f64 = 39.5;

/// Readings below this are classified as hypothermia.
pub const HYPOTHERMIA_THRESHOLD: f64 = 37.0;

/// An animal shared between the registry and the periodic actors.
/// The mutex makes every mutation atomic against concurrent sensors
/// and schedulers touching the same animal.
pub type SharedAnimal = Arc<Mutex<Animal>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Young,
    Growing,
    Adult,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Young => "Young",
            Category::Growing => "Growing",
            Category::Adult => "Adult",
        };
        f.write_str(label)
    }
}

impl FromStr for Category {
    type Err = FeedlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "young" => Ok(Category::Young),
            "growing" => Ok(Category::Growing),
            "adult" => Ok(Category::Adult),
            _ => Err(FeedlotError::UnknownCategory(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SicknessCause {
    Fever,
    Hypothermia,
}

impl fmt::Display for SicknessCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SicknessCause::Fever => f.write_str("fever"),
            SicknessCause::Hypothermia => f.write_str("hypothermia"),
        }
    }
}

/// Health state machine. No state is terminal; an animal can cycle
/// between them for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HealthStatus {
    #[default]
    Healthy,
    Sick(SicknessCause),
    UnderTreatment(SicknessCause),
    UnderObservation,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => f.write_str("Healthy"),
            HealthStatus::Sick(cause) => write!(f, "Sick - {cause}"),
            HealthStatus::UnderTreatment(cause) => write!(f, "Under treatment - {cause}"),
            HealthStatus::UnderObservation => f.write_str("Under observation"),
        }
    }
}

/// Classify a raw temperature reading. Pure function of the latest value.
pub fn classify_temperature(celsius: f64) -> Option<SicknessCause> {
    if celsius >= FEVER_THRESHOLD {
        Some(SicknessCause::Fever)
    } else if celsius < HYPOTHERMIA_THRESHOLD {
        Some(SicknessCause::Hypothermia)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Animal {
    id: u32,
    category: Category,
    weight: f64,
    initial_weight: f64,
    temperature: f64,
    health: HealthStatus,
    strategy_label: Option<String>,
    weight_history: Vec<f64>,
    temperature_history: Vec<f64>,
    days_on_feed: u32,
}

impl Animal {
    pub fn new(id: u32, category: Category, initial_weight: f64) -> Self {
        Self {
            id,
            category,
            weight: initial_weight,
            initial_weight,
            temperature: NORMAL_TEMPERATURE,
            health: HealthStatus::Healthy,
            strategy_label: None,
            weight_history: vec![initial_weight],
            temperature_history: vec![NORMAL_TEMPERATURE],
            days_on_feed: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn initial_weight(&self) -> f64 {
        self.initial_weight
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn health(&self) -> HealthStatus {
        self.health
    }

    pub fn strategy_label(&self) -> Option<&str> {
        self.strategy_label.as_deref()
    }

    pub fn weight_history(&self) -> &[f64] {
        &self.weight_history
    }

    pub fn temperature_history(&self) -> &[f64] {
        &self.temperature_history
    }

    pub fn days_on_feed(&self) -> u32 {
        self.days_on_feed
    }

    /// Apply a weight gain in kg and append it to the history.
    pub fn record_gain(&mut self, kg: f64) {
        self.weight += kg;
        self.weight_history.push(self.weight);
    }

    /// Apply a new temperature reading and reclassify health.
    ///
    /// Classification is a pure function of the latest reading, except
    /// that an active treatment is never cleared here; only an explicit
    /// recovery check (see `HealthResponder`) discharges the animal.
    pub fn record_temperature(&mut self, celsius: f64) {
        self.temperature = celsius;
        self.temperature_history.push(celsius);

        if matches!(self.health, HealthStatus::UnderTreatment(_)) {
            return;
        }
        self.health = match classify_temperature(celsius) {
            Some(cause) => HealthStatus::Sick(cause),
            None => HealthStatus::Healthy,
        };
    }

    pub fn set_health(&mut self, health: HealthStatus) {
        self.health = health;
    }

    pub fn set_strategy_label(&mut self, label: &str) {
        self.strategy_label = Some(label.to_string());
    }

    pub fn is_sick(&self) -> bool {
        matches!(
            self.health,
            HealthStatus::Sick(_) | HealthStatus::UnderTreatment(_)
        )
    }

    pub fn total_gain(&self) -> f64 {
        self.weight - self.initial_weight
    }

    /// Mean daily gain over `days`; zero before the first full day.
    pub fn gain_per_day(&self, days: u32) -> f64 {
        if days == 0 {
            0.0
        } else {
            self.total_gain() / f64::from(days)
        }
    }

    pub fn advance_day(&mut self) {
        self.days_on_feed += 1;
    }
}

impl fmt::Display for Animal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "animal #{} ({})", self.id, self.category)
    }
}
