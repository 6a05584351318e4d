//! PeriodicTask - background thread that runs a tick at a fixed interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// How long `stop()` waits for the worker before detaching it.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Slice used both for interruptible sleeping and for the stop poll.
const STOP_POLL: Duration = Duration::from_millis(25);

/// Owns one worker thread that sleeps for an interval, runs a tick, and
/// repeats until stopped. Every periodic actor (sensors, feeding, reports)
/// runs on one of these; the loops are fully independent of each other.
pub struct PeriodicTask {
    name: &'static str,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Start the periodic loop. Starting an already-running task is a no-op.
    ///
    /// The worker sleeps first, then ticks, so a freshly started actor does
    /// not fire immediately. Sleeping happens in short slices so `stop()`
    /// takes effect promptly even for long intervals.
    pub fn start<F>(&mut self, interval: Duration, mut tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("{} already running", self.name);
            return;
        }

        debug!("{} starting ({:?} interval)", self.name, interval);
        let running = Arc::clone(&self.running);
        let name = self.name;

        let handle = thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                let mut slept = Duration::ZERO;
                while slept < interval && running.load(Ordering::Relaxed) {
                    let step = STOP_POLL.min(interval - slept);
                    thread::sleep(step);
                    slept += step;
                }
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                tick();
            }
            debug!("{name} stopped");
        });

        self.handle = Some(handle);
    }

    /// Stop the loop and wait up to [`SHUTDOWN_TIMEOUT`] for the worker.
    /// An in-flight tick is never interrupted; if it overruns the timeout
    /// the thread is detached and finishes on its own.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.handle.take() {
            let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(STOP_POLL);
            }
            if handle.is_finished() {
                let _ = handle.join(); // Thread panic result intentionally ignored during shutdown
            } else {
                warn!("{} did not stop within {:?}, detaching", self.name, SHUTDOWN_TIMEOUT);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn ticks_at_the_configured_interval() {
        let tick_count = Arc::new(AtomicU32::new(0));
        let tick_count_clone = Arc::clone(&tick_count);

        let mut task = PeriodicTask::new("test-task");
        task.start(Duration::from_millis(100), move || {
            tick_count_clone.fetch_add(1, Ordering::Relaxed);
        });

        // Let it run for ~550ms (should get ~5 ticks)
        thread::sleep(Duration::from_millis(550));
        task.stop();

        let count = tick_count.load(Ordering::Relaxed);
        assert!((3..=7).contains(&count), "expected ~5 ticks, got {}", count);
        assert!(!task.is_running());
    }

    #[test]
    fn start_twice_is_a_noop() {
        let tick_count = Arc::new(AtomicU32::new(0));

        let mut task = PeriodicTask::new("idempotent");
        let first = Arc::clone(&tick_count);
        task.start(Duration::from_millis(50), move || {
            first.fetch_add(1, Ordering::Relaxed);
        });
        // Second start must not spawn a second loop.
        let second = Arc::clone(&tick_count);
        task.start(Duration::from_millis(5), move || {
            second.fetch_add(100, Ordering::Relaxed);
        });

        thread::sleep(Duration::from_millis(120));
        task.stop();

        assert!(tick_count.load(Ordering::Relaxed) < 100);
    }

    #[test]
    fn stop_twice_is_safe() {
        let mut task = PeriodicTask::new("stoppable");
        task.start(Duration::from_millis(20), || {});
        task.stop();
        task.stop();
        assert!(!task.is_running());
    }

    #[test]
    fn stop_is_prompt_for_long_intervals() {
        let mut task = PeriodicTask::new("slow-interval");
        task.start(Duration::from_secs(3600), || {});

        let start = Instant::now();
        task.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
