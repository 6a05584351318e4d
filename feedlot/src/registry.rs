//! The shared feedlot registry: one store of animals, pens, sensors and the
//! alert log for a simulation run.
//!
//! The registry is constructed explicitly and shared as an `Arc`; every
//! periodic actor holds a clone and sees the same state. Collections are
//! guarded by their own mutexes and each animal carries its own lock, so
//! structural changes and per-animal mutations stay atomic under
//! concurrent actors. Lock order is always animals before pens, and
//! collection locks are released before any animal lock is taken.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::alerts::{AlertLog, AlertSink};
use crate::animal::{Animal, SharedAnimal};
use crate::error::FeedlotError;
use crate::pen::Pen;
use crate::sensors::Sensor;

pub type SharedRegistry = Arc<FeedlotRegistry>;

#[derive(Default)]
pub struct FeedlotRegistry {
    animals: Mutex<BTreeMap<u32, SharedAnimal>>,
    pens: Mutex<BTreeMap<u32, Pen>>,
    sensors: Mutex<Vec<Sensor>>,
    alert_log: Arc<AlertLog>,
    day: AtomicU32,
    active: AtomicBool,
}

impl FeedlotRegistry {
    pub fn new() -> SharedRegistry {
        Arc::new(Self::default())
    }

    pub fn alert_log(&self) -> &Arc<AlertLog> {
        &self.alert_log
    }

    /// Register an animal and assign it to a pen in one step. The pen is
    /// created on demand with the default capacity. A full pen rejects
    /// the whole operation; no animal is left without a pen.
    pub fn add_animal(&self, animal: Animal, pen_number: u32) -> Result<SharedAnimal, FeedlotError> {
        let id = animal.id();
        let mut animals = self.animals.lock().unwrap();
        if animals.contains_key(&id) {
            return Err(FeedlotError::DuplicateAnimal(id));
        }

        let mut pens = self.pens.lock().unwrap();
        let pen = pens.entry(pen_number).or_insert_with(|| {
            info!("pen #{pen_number} created");
            Pen::new(pen_number)
        });
        pen.add(id)?;

        let shared = Arc::new(Mutex::new(animal));
        animals.insert(id, Arc::clone(&shared));
        Ok(shared)
    }

    /// Remove an animal from the registry and whichever pen holds it.
    pub fn remove_animal(&self, id: u32) -> bool {
        let mut animals = self.animals.lock().unwrap();
        if animals.remove(&id).is_none() {
            return false;
        }
        let mut pens = self.pens.lock().unwrap();
        for pen in pens.values_mut() {
            if pen.remove(id) {
                break;
            }
        }
        true
    }

    pub fn animal(&self, id: u32) -> Option<SharedAnimal> {
        self.animals.lock().unwrap().get(&id).map(Arc::clone)
    }

    /// Snapshot of all animal handles, ordered by id. The collection lock
    /// is released before the caller locks any individual animal.
    pub fn animals(&self) -> Vec<SharedAnimal> {
        self.animals.lock().unwrap().values().map(Arc::clone).collect()
    }

    pub fn animal_ids(&self) -> Vec<u32> {
        self.animals.lock().unwrap().keys().copied().collect()
    }

    pub fn animal_count(&self) -> usize {
        self.animals.lock().unwrap().len()
    }

    pub fn pen(&self, number: u32) -> Option<Pen> {
        self.pens.lock().unwrap().get(&number).cloned()
    }

    pub fn pens(&self) -> Vec<Pen> {
        self.pens.lock().unwrap().values().cloned().collect()
    }

    pub fn pen_count(&self) -> usize {
        self.pens.lock().unwrap().len()
    }

    /// Insert a pen as-is (its id list cleared); used on snapshot restore
    /// so custom capacities survive the round trip.
    pub fn add_pen(&self, mut pen: Pen) {
        pen.clear();
        self.pens.lock().unwrap().insert(pen.number(), pen);
    }

    /// Register a sensor, subscribing the registry's alert log to it.
    pub fn add_sensor(&self, mut sensor: Sensor) {
        sensor.subscribe(Arc::clone(&self.alert_log) as Arc<dyn AlertSink>);
        self.sensors.lock().unwrap().push(sensor);
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.lock().unwrap().len()
    }

    /// Start every registered sensor. Idempotent.
    pub fn start_monitoring(&self) {
        if self.active.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut sensors = self.sensors.lock().unwrap();
        for sensor in sensors.iter_mut() {
            sensor.start();
        }
        info!(
            "monitoring started: {} sensors over {} animals",
            sensors.len(),
            self.animal_count()
        );
    }

    /// Stop every sensor, waiting briefly for each loop to wind down.
    pub fn stop_monitoring(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut sensors = self.sensors.lock().unwrap();
        for sensor in sensors.iter_mut() {
            sensor.stop();
        }
        info!("monitoring stopped");
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn day(&self) -> u32 {
        self.day.load(Ordering::Relaxed)
    }

    pub fn set_day(&self, day: u32) {
        self.day.store(day, Ordering::Relaxed);
    }

    /// Advance the simulation-day counter, returning the new day.
    pub fn advance_day(&self) -> u32 {
        self.day.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Animals currently classified as sick or under treatment.
    pub fn sick_animals(&self) -> Vec<SharedAnimal> {
        self.animals()
            .into_iter()
            .filter(|animal| animal.lock().unwrap().is_sick())
            .collect()
    }

    /// The `n` animals with the highest total gain, best first.
    pub fn top_gainers(&self, n: usize) -> Vec<SharedAnimal> {
        let mut ranked: Vec<(f64, SharedAnimal)> = self
            .animals()
            .into_iter()
            .map(|animal| {
                let gain = animal.lock().unwrap().total_gain();
                (gain, animal)
            })
            .collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        ranked.into_iter().take(n).map(|(_, a)| a).collect()
    }

    /// Wipe everything: stop monitoring, drop animals, pens and sensors,
    /// clear the alert log and rewind the day counter.
    pub fn reset(&self) {
        self.stop_monitoring();
        self.sensors.lock().unwrap().clear();
        self.animals.lock().unwrap().clear();
        self.pens.lock().unwrap().clear();
        self.alert_log.clear();
        self.day.store(0, Ordering::Relaxed);
        info!("registry reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animal::Category;
    use crate::pen::DEFAULT_PEN_CAPACITY;

    #[test]
    fn add_assigns_animal_and_pen_atomically() {
        let registry = FeedlotRegistry::new();
        registry
            .add_animal(Animal::new(1, Category::Young, 180.0), 1)
            .unwrap();

        assert_eq!(registry.animal_count(), 1);
        let pen = registry.pen(1).unwrap();
        assert!(pen.contains(1));
        assert_eq!(pen.capacity(), DEFAULT_PEN_CAPACITY);
    }

    #[test]
    fn full_pen_leaves_no_orphan_animal() {
        let registry = FeedlotRegistry::new();
        registry.add_pen(Pen::with_capacity(1, 2));

        registry
            .add_animal(Animal::new(1, Category::Young, 180.0), 1)
            .unwrap();
        registry
            .add_animal(Animal::new(2, Category::Young, 190.0), 1)
            .unwrap();
        let err = registry
            .add_animal(Animal::new(3, Category::Young, 200.0), 1)
            .unwrap_err();

        assert!(matches!(err, FeedlotError::PenFull { .. }));
        assert_eq!(registry.pen(1).unwrap().len(), 2);
        assert_eq!(registry.animal_count(), 2);
        assert!(registry.animal(3).is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = FeedlotRegistry::new();
        registry
            .add_animal(Animal::new(7, Category::Adult, 420.0), 1)
            .unwrap();
        let err = registry
            .add_animal(Animal::new(7, Category::Adult, 430.0), 2)
            .unwrap_err();
        assert!(matches!(err, FeedlotError::DuplicateAnimal(7)));
    }

    #[test]
    fn clones_share_state() {
        let registry = FeedlotRegistry::new();
        let other = Arc::clone(&registry);

        registry
            .add_animal(Animal::new(1, Category::Growing, 280.0), 1)
            .unwrap();
        other.advance_day();

        assert_eq!(other.animal_count(), 1);
        assert_eq!(registry.day(), 1);

        // Mutations through one handle are visible through the other.
        let animal = other.animal(1).unwrap();
        animal.lock().unwrap().record_gain(5.0);
        let via_registry = registry.animal(1).unwrap();
        assert!((via_registry.lock().unwrap().weight() - 285.0).abs() < 1e-9);
    }

    #[test]
    fn remove_clears_the_pen_slot() {
        let registry = FeedlotRegistry::new();
        registry
            .add_animal(Animal::new(1, Category::Young, 180.0), 2)
            .unwrap();

        assert!(registry.remove_animal(1));
        assert!(!registry.remove_animal(1));
        assert!(!registry.pen(2).unwrap().contains(1));
    }

    #[test]
    fn top_gainers_rank_by_total_gain() {
        let registry = FeedlotRegistry::new();
        for (id, gain) in [(1u32, 2.0f64), (2, 9.0), (3, 5.0)] {
            let shared = registry
                .add_animal(Animal::new(id, Category::Growing, 300.0), 1)
                .unwrap();
            shared.lock().unwrap().record_gain(gain);
        }

        let top: Vec<u32> = registry
            .top_gainers(2)
            .iter()
            .map(|a| a.lock().unwrap().id())
            .collect();
        assert_eq!(top, vec![2, 3]);
    }

    #[test]
    fn reset_returns_to_a_clean_slate() {
        let registry = FeedlotRegistry::new();
        registry
            .add_animal(Animal::new(1, Category::Young, 180.0), 1)
            .unwrap();
        registry.advance_day();
        registry.reset();

        assert_eq!(registry.animal_count(), 0);
        assert_eq!(registry.pen_count(), 0);
        assert_eq!(registry.day(), 0);
        assert!(!registry.is_active());
    }
}
