//! Feeding scheduler: applies each animal's assigned strategy on a fixed
//! interval, auto-assigning strategies to animals that lack one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::registry::SharedRegistry;
use crate::runner::PeriodicTask;
use crate::strategy::FeedingStrategy;

pub const DEFAULT_FEEDING_INTERVAL: Duration = Duration::from_secs(10);

type Assignments = Arc<Mutex<HashMap<u32, FeedingStrategy>>>;

/// Per-strategy headcount and daily cost totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RationCosts {
    pub normal: usize,
    pub intensive: usize,
    pub maintenance: usize,
    pub total_daily_cost: f64,
    pub mean_daily_cost: f64,
}

pub struct FeedingScheduler {
    registry: SharedRegistry,
    assignments: Assignments,
    interval: Duration,
    task: PeriodicTask,
}

impl FeedingScheduler {
    pub fn new(registry: SharedRegistry) -> Self {
        Self::with_interval(registry, DEFAULT_FEEDING_INTERVAL)
    }

    pub fn with_interval(registry: SharedRegistry, interval: Duration) -> Self {
        Self {
            registry,
            assignments: Arc::new(Mutex::new(HashMap::new())),
            interval,
            task: PeriodicTask::new("feeding-scheduler"),
        }
    }

    /// Pin a strategy to an animal, replacing any previous assignment.
    pub fn assign(&self, animal_id: u32, strategy: FeedingStrategy) {
        self.assignments.lock().unwrap().insert(animal_id, strategy);
        info!("strategy '{strategy}' assigned to animal #{animal_id}");
    }

    pub fn assignment(&self, animal_id: u32) -> Option<FeedingStrategy> {
        self.assignments.lock().unwrap().get(&animal_id).copied()
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.lock().unwrap().len()
    }

    /// Start the periodic feeding loop; starting twice is a no-op.
    pub fn start(&mut self) {
        let registry = Arc::clone(&self.registry);
        let assignments = Arc::clone(&self.assignments);
        self.task.start(self.interval, move || {
            apply_rations(&registry, &assignments);
        });
    }

    pub fn stop(&mut self) {
        self.task.stop();
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Feed every registered animal once, exactly as a scheduler tick does.
    pub fn feed_now(&self) {
        apply_rations(&self.registry, &self.assignments);
    }

    /// Re-evaluate every assignment against the auto rule and reassign
    /// where the outcome changed (a recovered animal moves off
    /// maintenance, a filled-out animal moves off intensive). Returns the
    /// number of changes.
    pub fn optimize(&self) -> usize {
        let mut changes = 0;
        for animal in self.registry.animals() {
            let (id, wanted) = {
                let a = animal.lock().unwrap();
                (a.id(), FeedingStrategy::auto_assign(&a))
            };
            let mut assignments = self.assignments.lock().unwrap();
            match assignments.insert(id, wanted) {
                Some(previous) if previous != wanted => {
                    info!("animal #{id} moved from '{previous}' to '{wanted}'");
                    changes += 1;
                }
                _ => {}
            }
        }
        if changes > 0 {
            info!("feeding optimization complete: {changes} change(s)");
        }
        changes
    }

    /// Cost summary over the current assignments.
    pub fn ration_costs(&self) -> RationCosts {
        let assignments = self.assignments.lock().unwrap();
        let mut costs = RationCosts::default();
        for strategy in assignments.values() {
            match strategy {
                FeedingStrategy::Normal => costs.normal += 1,
                FeedingStrategy::Intensive => costs.intensive += 1,
                FeedingStrategy::Maintenance => costs.maintenance += 1,
            }
            costs.total_daily_cost += strategy.daily_cost();
        }
        if !assignments.is_empty() {
            costs.mean_daily_cost = costs.total_daily_cost / assignments.len() as f64;
        }
        costs
    }
}

/// One scheduler tick: auto-assign where needed, then apply each animal's
/// strategy once. The assignments lock and the animal locks are never
/// held at the same time.
fn apply_rations(registry: &SharedRegistry, assignments: &Assignments) {
    let animals = registry.animals();
    if animals.is_empty() {
        return;
    }

    let mut total = 0.0;
    for animal in &animals {
        let (id, auto) = {
            let a = animal.lock().unwrap();
            (a.id(), FeedingStrategy::auto_assign(&a))
        };
        let strategy = {
            let mut map = assignments.lock().unwrap();
            match map.get(&id) {
                Some(assigned) => *assigned,
                None => {
                    info!("strategy '{auto}' auto-assigned to animal #{id}");
                    map.insert(id, auto);
                    auto
                }
            }
        };
        total += {
            let mut a = animal.lock().unwrap();
            strategy.apply(&mut a)
        };
    }
    debug!(
        "rations applied to {} animals (+{total:.1} kg total)",
        animals.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animal::{Animal, Category, HealthStatus, SicknessCause};
    use crate::registry::FeedlotRegistry;

    fn registry_with(animals: Vec<Animal>) -> SharedRegistry {
        let registry = FeedlotRegistry::new();
        for animal in animals {
            registry.add_animal(animal, 1).unwrap();
        }
        registry
    }

    #[test]
    fn tick_auto_assigns_and_feeds() {
        let registry = registry_with(vec![
            Animal::new(1, Category::Young, 200.0),   // light -> intensive
            Animal::new(2, Category::Growing, 300.0), // at the boundary -> normal
        ]);
        let scheduler = FeedingScheduler::new(Arc::clone(&registry));

        scheduler.feed_now();

        assert_eq!(scheduler.assignment(1), Some(FeedingStrategy::Intensive));
        assert_eq!(scheduler.assignment(2), Some(FeedingStrategy::Normal));

        let light = registry.animal(1).unwrap();
        assert!((light.lock().unwrap().weight() - 202.0).abs() < 1e-9);
        assert_eq!(light.lock().unwrap().strategy_label(), Some("Intensive"));

        let heavy = registry.animal(2).unwrap();
        assert!((heavy.lock().unwrap().weight() - 301.0).abs() < 1e-9);
    }

    #[test]
    fn sick_animals_get_maintenance() {
        let mut sick = Animal::new(3, Category::Adult, 450.0);
        sick.set_health(HealthStatus::Sick(SicknessCause::Fever));
        let registry = registry_with(vec![sick]);
        let scheduler = FeedingScheduler::new(Arc::clone(&registry));

        scheduler.feed_now();
        assert_eq!(scheduler.assignment(3), Some(FeedingStrategy::Maintenance));
    }

    #[test]
    fn manual_assignment_survives_ticks() {
        let registry = registry_with(vec![Animal::new(4, Category::Young, 180.0)]);
        let scheduler = FeedingScheduler::new(Arc::clone(&registry));

        scheduler.assign(4, FeedingStrategy::Maintenance);
        scheduler.feed_now();

        assert_eq!(scheduler.assignment(4), Some(FeedingStrategy::Maintenance));
        let animal = registry.animal(4).unwrap();
        assert!((animal.lock().unwrap().weight() - 180.3).abs() < 1e-9);
    }

    #[test]
    fn optimize_moves_recovered_animals_off_maintenance() {
        let registry = registry_with(vec![Animal::new(5, Category::Growing, 320.0)]);
        let scheduler = FeedingScheduler::new(Arc::clone(&registry));

        // Sick at first: maintenance.
        let animal = registry.animal(5).unwrap();
        animal
            .lock()
            .unwrap()
            .set_health(HealthStatus::Sick(SicknessCause::Fever));
        scheduler.feed_now();
        assert_eq!(scheduler.assignment(5), Some(FeedingStrategy::Maintenance));

        // Recovered and over 300 kg: normal.
        animal.lock().unwrap().set_health(HealthStatus::Healthy);
        let changes = scheduler.optimize();
        assert_eq!(changes, 1);
        assert_eq!(scheduler.assignment(5), Some(FeedingStrategy::Normal));

        // A second pass changes nothing.
        assert_eq!(scheduler.optimize(), 0);
    }

    #[test]
    fn ration_costs_sum_assignments() {
        let registry = registry_with(vec![
            Animal::new(6, Category::Young, 180.0),
            Animal::new(7, Category::Growing, 330.0),
        ]);
        let scheduler = FeedingScheduler::new(Arc::clone(&registry));
        scheduler.assign(6, FeedingStrategy::Intensive);
        scheduler.assign(7, FeedingStrategy::Normal);

        let costs = scheduler.ration_costs();
        assert_eq!(costs.intensive, 1);
        assert_eq!(costs.normal, 1);
        assert!((costs.total_daily_cost - 430.0).abs() < 1e-9);
        assert!((costs.mean_daily_cost - 215.0).abs() < 1e-9);
    }
}
