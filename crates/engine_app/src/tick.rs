//! Fixed-timestep tick loop.
//!
//! The loop owns the [`World`] and calls [`World::tick`] once per step with
//! a constant `delta` of `1 / tick_rate` seconds. `elapsed_ms` is simulated
//! time, so a run is deterministic regardless of wall-clock jitter.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use engine_ecs::{FrameReport, World};

/// Configuration for the tick loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    /// Seconds per tick. Non-positive rates fall back to the default 60 Hz.
    #[must_use]
    pub fn delta(&self) -> f64 {
        if self.tick_rate > 0.0 {
            1.0 / self.tick_rate
        } else {
            1.0 / 60.0
        }
    }
}

/// The host's tick loop state.
pub struct TickLoop {
    config: TickConfig,
    world: World,
    elapsed_ms: f64,
    /// Failures reported by the world since the loop started.
    failures: usize,
}

impl TickLoop {
    /// Create a tick loop driving `world`.
    #[must_use]
    pub fn new(config: TickConfig, world: World) -> Self {
        Self {
            config,
            world,
            elapsed_ms: 0.0,
            failures: 0,
        }
    }

    /// Returns the world's frame counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.world.frame()
    }

    /// Simulated time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// Failures reported since the loop started.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Returns a reference to the world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Returns a mutable reference to the world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Consume the loop and return the world.
    #[must_use]
    pub fn into_world(self) -> World {
        self.world
    }

    /// Run one tick of the simulation.
    pub fn tick(&mut self) -> FrameReport {
        let delta = self.config.delta();
        self.elapsed_ms += delta * 1000.0;
        let report = self.world.tick(self.elapsed_ms, delta);
        self.failures += report.failures.len();

        debug!(
            tick_id = report.frame,
            systems = report.systems_run,
            failures = report.failures.len(),
            "tick complete"
        );
        report
    }

    /// Run the tick loop for the configured number of ticks, or indefinitely.
    ///
    /// Sleeps between ticks to hold the configured rate.
    pub fn run(&mut self) {
        let tick_duration = Duration::from_secs_f64(self.config.delta());
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            self.tick();

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, failures = self.failures, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use engine_ecs::{Frame, HookResult, Phase, System};

    use super::*;

    struct Clock(Rc<RefCell<Vec<(u64, f64, f64)>>>);

    impl System for Clock {
        fn update(&mut self, frame: &mut Frame<'_>) -> HookResult {
            self.0
                .borrow_mut()
                .push((frame.frame(), frame.elapsed_ms(), frame.delta()));
            Ok(())
        }
    }

    struct AlwaysFails;

    impl System for AlwaysFails {
        fn update(&mut self, _frame: &mut Frame<'_>) -> HookResult {
            anyhow::bail!("always")
        }
    }

    #[test]
    fn test_tick_advances_counter() {
        let mut tick_loop = TickLoop::new(TickConfig::default(), World::new());
        assert_eq!(tick_loop.tick_id(), 0);
        tick_loop.tick();
        assert_eq!(tick_loop.tick_id(), 1);
        tick_loop.tick();
        assert_eq!(tick_loop.tick_id(), 2);
    }

    #[test]
    fn test_fixed_timestep_passthrough() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut world = World::new();
        world.register_system(Clock(Rc::clone(&seen)), Phase::Update, 0.0);
        let config = TickConfig {
            tick_rate: 4.0,
            max_ticks: 0,
        };
        let mut tick_loop = TickLoop::new(config, world);
        tick_loop.tick();
        tick_loop.tick();
        assert_eq!(*seen.borrow(), vec![(1, 250.0, 0.25), (2, 500.0, 0.25)]);
    }

    #[test]
    fn test_failures_are_counted() {
        let mut world = World::new();
        world.register_system(AlwaysFails, Phase::Update, 0.0);
        let mut tick_loop = TickLoop::new(TickConfig::default(), world);
        tick_loop.tick();
        tick_loop.tick();
        assert_eq!(tick_loop.failures(), 2);
    }

    #[test]
    fn test_non_positive_rate_falls_back() {
        let config = TickConfig {
            tick_rate: 0.0,
            max_ticks: 0,
        };
        assert_eq!(config.delta(), 1.0 / 60.0);
    }

    #[test]
    fn test_run_limited_ticks() {
        let config = TickConfig {
            tick_rate: 1000.0, // fast for testing
            max_ticks: 5,
        };
        let mut tick_loop = TickLoop::new(config, World::new());
        tick_loop.run();
        assert_eq!(tick_loop.tick_id(), 5);
    }
}
