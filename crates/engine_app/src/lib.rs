//! # engine_app
//!
//! The scene and the loop that drives it.
//!
//! - [`Scene`] owns every live [`Entity`](engine_component::Entity) and the
//!   registered systems, and runs the synchronization pass that applies
//!   queued structural commands and updates monitoring.
//! - [`Engine`] ticks a scene at a fixed rate configured by [`TickConfig`].
//! - [`demo`] holds the example components and systems used by the binary.

pub mod demo;
pub mod error;
pub mod scene;
pub mod tick;

pub use error::SceneError;
pub use scene::{Scene, SyncReport};
pub use tick::{Engine, TickConfig, TickReport};
