//! Feeding strategies: pluggable weight-increment policies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::animal::{Animal, FEVER_THRESHOLD};
use crate::error::FeedlotError;

/// Weight below which the auto-assignment rule prefers intensive feeding.
pub const INTENSIVE_ASSIGN_BELOW: f64 = 300.0;

/// Weight at and above which intensive feeding stops being suitable.
pub const INTENSIVE_SUITABLE_BELOW: f64 = 350.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedingStrategy {
    Normal,
    Intensive,
    Maintenance,
}

impl FeedingStrategy {
    /// Weight increment in kg per application.
    pub fn increment(self) -> f64 {
        match self {
            FeedingStrategy::Normal => 1.0,
            FeedingStrategy::Intensive => 2.0,
            FeedingStrategy::Maintenance => 0.3,
        }
    }

    /// Ration cost per day.
    pub fn daily_cost(self) -> f64 {
        match self {
            FeedingStrategy::Normal => 150.0,
            FeedingStrategy::Intensive => 280.0,
            FeedingStrategy::Maintenance => 100.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FeedingStrategy::Normal => "Normal",
            FeedingStrategy::Intensive => "Intensive",
            FeedingStrategy::Maintenance => "Maintenance",
        }
    }

    pub fn description(self) -> String {
        let purpose = match self {
            FeedingStrategy::Normal => "steady fattening for animals in standard condition",
            FeedingStrategy::Intensive => "accelerated fattening for light, healthy animals",
            FeedingStrategy::Maintenance => "minimal ration for sick or recovering animals",
        };
        format!(
            "{}: {purpose} (+{:.1} kg per application, {:.0}/day)",
            self.name(),
            self.increment(),
            self.daily_cost()
        )
    }

    pub fn is_suitable_for(self, animal: &Animal) -> bool {
        match self {
            FeedingStrategy::Normal => !animal.is_sick(),
            FeedingStrategy::Intensive => {
                !animal.is_sick() && animal.weight() < INTENSIVE_SUITABLE_BELOW
            }
            FeedingStrategy::Maintenance => {
                animal.is_sick() || animal.temperature() >= FEVER_THRESHOLD
            }
        }
    }

    /// Apply the ration: add the increment to the animal's weight and
    /// record which strategy fed it. Returns the increment.
    pub fn apply(self, animal: &mut Animal) -> f64 {
        let increment = self.increment();
        animal.record_gain(increment);
        animal.set_strategy_label(self.name());
        increment
    }

    /// Pick a strategy from the animal's current state: sick animals get
    /// maintenance, light animals get intensive, the rest feed normally.
    pub fn auto_assign(animal: &Animal) -> Self {
        if animal.is_sick() {
            FeedingStrategy::Maintenance
        } else if animal.weight() < INTENSIVE_ASSIGN_BELOW {
            FeedingStrategy::Intensive
        } else {
            FeedingStrategy::Normal
        }
    }
}

impl fmt::Display for FeedingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeedingStrategy {
    type Err = FeedlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(FeedingStrategy::Normal),
            "intensive" => Ok(FeedingStrategy::Intensive),
            "maintenance" => Ok(FeedingStrategy::Maintenance),
            _ => Err(FeedlotError::UnknownStrategy(s.to_string())),
        }
    }
}
