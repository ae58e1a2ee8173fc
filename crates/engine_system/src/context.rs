//! Per-tick execution context provided to systems.

use engine_component::CommandQueue;

/// Context handed to [`System::process_entity`](crate::System::process_entity)
/// on each tick.
///
/// Structural changes to *other* entities (spawning, killing, adding or
/// removing their components) go through [`SystemContext::commands`] and take
/// effect at the next synchronization pass, never during the current one.
#[derive(Debug, Clone)]
pub struct SystemContext {
    /// The current tick id.
    pub tick_id: u64,
    /// Delta time since the last tick, in seconds.
    pub dt: f64,
    /// Queue for deferred structural requests.
    pub commands: CommandQueue,
}

impl SystemContext {
    /// Create a new context for a tick.
    #[must_use]
    pub fn new(tick_id: u64, dt: f64, commands: CommandQueue) -> Self {
        Self {
            tick_id,
            dt,
            commands,
        }
    }
}
