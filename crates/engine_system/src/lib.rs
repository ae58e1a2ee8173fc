//! # engine_system
//!
//! System runtime library for the ECS engine.
//!
//! A system is a unit of per-entity logic. It declares one or more
//! [`RequirementGroup`]s; the scene keeps it informed of which entities
//! satisfy them, firing lifecycle hooks as entities come and go, and calls
//! [`System::process_entity`] on each monitored, active entity every tick.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use engine_component::Entity;
//! use engine_system::{BaseSystem, RequirementGroup, System, SystemContext};
//!
//! struct Gravity;
//!
//! impl System for Gravity {
//!     fn process_entity(&mut self, entity: &mut Entity, ctx: &SystemContext) {
//!         // integrate velocity using ctx.dt ...
//!     }
//! }
//!
//! let system = BaseSystem::new(Gravity).with_requirement(RequirementGroup::new());
//! ```

pub mod context;
pub mod error;
pub mod registry;
pub mod requirement;
pub mod system;

pub use context::SystemContext;
pub use error::SystemError;
pub use registry::{SystemHandle, SystemRegistry};
pub use requirement::RequirementGroup;
pub use system::{BaseSystem, MonitorChange, System, SystemTypeId};
