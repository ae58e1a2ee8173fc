//! # engine_component
//!
//! The "C" and "E" of the ECS runtime: what a component is, how an entity
//! owns its components, and how structural changes are deferred to the
//! scene's synchronization pass.
//!
//! This crate provides:
//!
//! - [`Component`] trait and its type-erased form [`AnyComponent`].
//! - [`ComponentTypeId`]: lazily assigned, process-wide component type ids,
//!   resolvable by name for untyped callers.
//! - [`ComponentStorage`]: one owned component per type, per entity.
//! - [`Entity`], [`EntityId`] and the never-recycling [`EntityAllocator`].
//! - [`CommandQueue`]: deferred structural commands drained by the scene.
//! - [`Template`]: the save/spawn hand-off format, plus [`TemplateSink`].

pub mod codec;
pub mod command;
pub mod component;
pub mod entity;
pub mod error;
pub mod storage;
pub mod template;
pub mod type_index;

pub use command::{Command, CommandQueue, CommandReceiver, command_queue};
pub use component::{
    AnyComponent, Component, ComponentTypeId, decode_named, register_component,
    registered_component_count,
};
pub use entity::{Entity, EntityAllocator, EntityId};
pub use error::ComponentError;
pub use storage::ComponentStorage;
pub use template::{ComponentRecord, Template, TemplateLibrary, TemplateSink};
pub use type_index::TypeIndex;
