//! Engine tick loop.
//!
//! Each tick runs the fixed lifecycle:
//!
//! 1. Synchronize the scene: apply queued structural commands and update
//!    every system's monitored set.
//! 2. Run each active system over its monitored, active entities.
//! 3. Advance the tick counter.
//!
//! Structural requests made during step 2 land in the scene's command queue
//! and take effect at step 1 of the next tick.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use engine_system::SystemContext;

use crate::scene::{Scene, SyncReport};

/// Environment variable overriding [`TickConfig::tick_rate`].
pub const TICK_RATE_ENV: &str = "ENGINE_TICK_RATE";
/// Environment variable overriding [`TickConfig::max_ticks`].
pub const MAX_TICKS_ENV: &str = "ENGINE_MAX_TICKS";

const DEFAULT_TICK_RATE: f64 = 60.0;

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    /// Defaults, overridden by `ENGINE_TICK_RATE` and `ENGINE_MAX_TICKS`.
    ///
    /// Values that do not parse, and tick rates whose period is not a
    /// representable [`Duration`], are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(TICK_RATE_ENV) {
            match raw.parse::<f64>() {
                Ok(rate) if Self::period(rate).is_some() => config.tick_rate = rate,
                _ => warn!(var = TICK_RATE_ENV, value = %raw, "ignoring invalid tick rate"),
            }
        }
        if let Some(raw) = lookup(MAX_TICKS_ENV) {
            match raw.parse::<u64>() {
                Ok(ticks) => config.max_ticks = ticks,
                Err(_) => warn!(var = MAX_TICKS_ENV, value = %raw, "ignoring invalid tick limit"),
            }
        }
        config
    }

    /// Duration of one tick at `rate`, or `None` when the rate is not
    /// positive or its period overflows a [`Duration`].
    #[must_use]
    pub fn period(rate: f64) -> Option<Duration> {
        if rate > 0.0 {
            Duration::try_from_secs_f64(1.0 / rate).ok()
        } else {
            None
        }
    }

    /// Duration of one tick at the configured rate.
    ///
    /// An unusable `tick_rate` falls back to the default rate.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Self::period(self.tick_rate).unwrap_or_else(|| {
            warn!(tick_rate = self.tick_rate, "unusable tick rate, using default");
            Duration::from_secs_f64(1.0 / DEFAULT_TICK_RATE)
        })
    }
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tick_id: u64,
    pub sync: SyncReport,
    /// `process_entity` calls made across all systems.
    pub processed: usize,
}

/// A scene driven at a fixed timestep.
#[derive(Debug)]
pub struct Engine {
    /// Current tick counter.
    tick_id: u64,
    config: TickConfig,
    scene: Scene,
}

impl Engine {
    /// Create an engine with an empty scene.
    #[must_use]
    pub fn new(config: TickConfig) -> Self {
        Self::with_scene(config, Scene::new())
    }

    #[must_use]
    pub fn with_scene(config: TickConfig, scene: Scene) -> Self {
        Self {
            tick_id: 0,
            config,
            scene,
        }
    }

    /// Returns the number of ticks run so far.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    #[must_use]
    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Run one tick of the simulation.
    ///
    /// Entities detached during synchronization stay parked in the scene
    /// until [`Scene::take_detached`] collects them.
    pub fn tick(&mut self, dt: f64) -> TickReport {
        self.tick_id += 1;

        let sync = self.scene.synchronize();
        let ctx = SystemContext::new(self.tick_id, dt, self.scene.commands().clone());
        let processed = self.scene.process_systems(&ctx);

        debug!(
            tick_id = self.tick_id,
            dt,
            entities = self.scene.entity_count(),
            processed,
            "tick complete"
        );
        let detached = self.scene.detached_count();
        if detached > 0 {
            debug!(tick_id = self.tick_id, detached, "released entities awaiting take_detached");
        }

        TickReport {
            tick_id: self.tick_id,
            sync,
            processed,
        }
    }

    /// Run the tick loop for the configured number of ticks, or
    /// indefinitely. Blocks the calling thread.
    pub fn run(&mut self) {
        let tick_duration = self.config.tick_duration();
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            self.tick(tick_duration.as_secs_f64());

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(
                    ticks = tick_count,
                    entities = self.scene.entity_count(),
                    "tick loop complete"
                );
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }
}
