//! Weight and temperature sensors: periodic actors that generate synthetic
//! readings, mutate one animal, and emit alerts on threshold crossings.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::alerts::{AlertKind, AlertSink};
use crate::animal::{classify_temperature, SharedAnimal, SicknessCause, NORMAL_TEMPERATURE};
use crate::runner::PeriodicTask;

/// A weight read below this increment raises a low-gain alert.
pub const LOW_GAIN_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Weight,
    Temperature,
}

/// One sensor bound to one animal, running on its own timed loop.
/// Observers are invoked synchronously from the sensor's thread, in
/// registration order, after the animal lock has been released.
pub struct Sensor {
    kind: SensorKind,
    animal: SharedAnimal,
    interval: Duration,
    observers: Vec<Arc<dyn AlertSink>>,
    task: PeriodicTask,
}

impl Sensor {
    pub fn weight(animal: SharedAnimal, interval: Duration) -> Self {
        Self::new(SensorKind::Weight, animal, interval, "weight-sensor")
    }

    pub fn temperature(animal: SharedAnimal, interval: Duration) -> Self {
        Self::new(SensorKind::Temperature, animal, interval, "temperature-sensor")
    }

    fn new(
        kind: SensorKind,
        animal: SharedAnimal,
        interval: Duration,
        name: &'static str,
    ) -> Self {
        Self {
            kind,
            animal,
            interval,
            observers: Vec::new(),
            task: PeriodicTask::new(name),
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn animal_id(&self) -> u32 {
        self.animal.lock().unwrap().id()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    pub fn subscribe(&mut self, observer: Arc<dyn AlertSink>) {
        self.observers.push(observer);
    }

    /// Start the read loop; starting twice is a no-op.
    pub fn start(&mut self) {
        let kind = self.kind;
        let animal = Arc::clone(&self.animal);
        let observers = self.observers.clone();

        self.task.start(self.interval, move || {
            let mut rng = rand::thread_rng();
            match kind {
                SensorKind::Weight => {
                    read_weight(&animal, &observers, rng.gen_range(0.5..1.5));
                }
                SensorKind::Temperature => {
                    let reading = NORMAL_TEMPERATURE + rng.gen_range(-0.5..1.5);
                    read_temperature(&animal, &observers, reading);
                }
            }
        });
    }

    /// Stop the read loop, waiting briefly for the current read to finish.
    pub fn stop(&mut self) {
        self.task.stop();
    }
}

/// Apply one weight reading: record the gain and alert on low performance.
pub fn read_weight(animal: &SharedAnimal, observers: &[Arc<dyn AlertSink>], gain: f64) {
    let (id, total) = {
        let mut a = animal.lock().unwrap();
        a.record_gain(gain);
        (a.id(), a.weight())
    };
    debug!("animal #{id}: +{gain:.2} kg (total {total:.2} kg)");

    if gain < LOW_GAIN_THRESHOLD {
        let message = format!("low gain on animal #{id}: +{gain:.2} kg");
        for observer in observers {
            observer.notify(animal, &message, AlertKind::LowGain);
        }
    }
}

/// Apply one temperature reading: update the animal and alert on fever
/// or hypothermia.
pub fn read_temperature(animal: &SharedAnimal, observers: &[Arc<dyn AlertSink>], celsius: f64) {
    let id = {
        let mut a = animal.lock().unwrap();
        a.record_temperature(celsius);
        a.id()
    };
    debug!("animal #{id}: {celsius:.1} C");

    let Some(cause) = classify_temperature(celsius) else {
        return;
    };
    let (kind, message) = match cause {
        SicknessCause::Fever => (
            AlertKind::Fever,
            format!("fever detected on animal #{id}: {celsius:.1} C"),
        ),
        SicknessCause::Hypothermia => (
            AlertKind::Hypothermia,
            format!("hypothermia on animal #{id}: {celsius:.1} C"),
        ),
    };
    for observer in observers {
        observer.notify(animal, &message, kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertLog, HealthResponder};
    use crate::animal::{Animal, Category, HealthStatus};
    use std::sync::Mutex;

    fn shared(animal: Animal) -> SharedAnimal {
        Arc::new(Mutex::new(animal))
    }

    #[test]
    fn low_gain_reading_alerts_every_observer() {
        let animal = shared(Animal::new(1, Category::Young, 200.0));
        let log = Arc::new(AlertLog::new());
        let responder = Arc::new(HealthResponder::new());
        let observers: Vec<Arc<dyn AlertSink>> = vec![responder.clone(), log.clone()];

        read_weight(&animal, &observers, 0.55);

        assert_eq!(log.count_for_kind(AlertKind::LowGain), 1);
        assert_eq!(
            animal.lock().unwrap().health(),
            HealthStatus::UnderObservation
        );
        assert!((animal.lock().unwrap().weight() - 200.55).abs() < 1e-9);
    }

    #[test]
    fn normal_gain_stays_silent() {
        let animal = shared(Animal::new(2, Category::Growing, 300.0));
        let log = Arc::new(AlertLog::new());
        let observers: Vec<Arc<dyn AlertSink>> = vec![log.clone()];

        read_weight(&animal, &observers, 1.2);
        assert_eq!(log.count(), 0);
    }

    #[test]
    fn fever_reading_emits_one_alert_and_starts_treatment() {
        let animal = shared(Animal::new(3, Category::Growing, 320.0));
        let log = Arc::new(AlertLog::new());
        let responder = Arc::new(HealthResponder::new());
        let observers: Vec<Arc<dyn AlertSink>> = vec![responder.clone(), log.clone()];

        read_temperature(&animal, &observers, 39.6);

        assert_eq!(log.count_for_kind(AlertKind::Fever), 1);
        assert_eq!(
            animal.lock().unwrap().health(),
            HealthStatus::UnderTreatment(crate::animal::SicknessCause::Fever)
        );

        // A later normal reading does not clear the treatment...
        read_temperature(&animal, &observers, 38.0);
        assert_eq!(log.count(), 1);
        assert_eq!(
            animal.lock().unwrap().health(),
            HealthStatus::UnderTreatment(crate::animal::SicknessCause::Fever)
        );

        // ...but the polled recovery check discharges it.
        assert!(responder.check_recovery(&animal));
        assert_eq!(animal.lock().unwrap().health(), HealthStatus::Healthy);
    }

    #[test]
    fn hypothermia_reading_alerts() {
        let animal = shared(Animal::new(4, Category::Adult, 470.0));
        let log = Arc::new(AlertLog::new());
        let observers: Vec<Arc<dyn AlertSink>> = vec![log.clone()];

        read_temperature(&animal, &observers, 36.8);
        assert_eq!(log.count_for_kind(AlertKind::Hypothermia), 1);
    }

    #[test]
    fn sensor_runs_and_stops() {
        let animal = shared(Animal::new(5, Category::Young, 190.0));
        let mut sensor = Sensor::weight(Arc::clone(&animal), Duration::from_millis(40));
        assert_eq!(sensor.kind(), SensorKind::Weight);

        sensor.start();
        assert!(sensor.is_running());
        std::thread::sleep(Duration::from_millis(220));
        sensor.stop();
        assert!(!sensor.is_running());

        let history_len = animal.lock().unwrap().weight_history().len();
        assert!(history_len > 1, "sensor never read (history {history_len})");
    }
}
