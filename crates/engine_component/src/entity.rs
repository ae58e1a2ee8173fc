//! Entity identity, id allocation and the [`Entity`] itself.
//!
//! An [`Entity`] is an immutable [`EntityId`], an active flag and the
//! [`ComponentStorage`] it owns. Component changes are applied to storage
//! immediately; what is deferred is the systems' re-evaluation of the entity,
//! which is requested through the scene's [`CommandQueue`] and happens at the
//! next synchronization pass.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::command::CommandQueue;
use crate::component::{AnyComponent, Component, ComponentTypeId};
use crate::error::ComponentError;
use crate::storage::ComponentStorage;
use crate::template::{Template, TemplateSink};

/// A unique entity identifier.
///
/// Ids come from an [`EntityAllocator`] and are never reused, so a stale id
/// can never silently resolve to a different entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The null / invalid entity sentinel.
    pub const INVALID: EntityId = EntityId(0);

    /// Create an entity id from a raw `u64`.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) id.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Allocates monotonically increasing entity ids.
///
/// Cloning shares the counter, so scenes (and their command queues) that
/// share an allocator share one id space. Ids start at 1; 0 is reserved for
/// [`EntityId::INVALID`]. Ids are never recycled.
#[derive(Debug, Clone)]
pub struct EntityAllocator {
    next_id: Arc<AtomicU64>,
}

impl EntityAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocates a fresh entity id.
    pub fn allocate(&self) -> EntityId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug_assert_ne!(id, u64::MAX, "entity id space exhausted");
        EntityId(id)
    }

    /// Returns the number of ids allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// An identity plus the components it owns.
///
/// Entities are created by a scene, which links them to its command queue.
/// An entity constructed with [`Entity::new`] is detached: its components
/// work normally, but [`refresh`](Entity::refresh), [`kill`](Entity::kill)
/// and [`detach`](Entity::detach) have no scene to notify and do nothing.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    active: bool,
    components: ComponentStorage,
    scene: Option<CommandQueue>,
}

impl Entity {
    /// Create a detached, active entity with no components.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            active: true,
            components: ComponentStorage::new(),
            scene: None,
        }
    }

    /// Link this entity to a scene's command queue. Called by the scene that
    /// takes ownership of the entity.
    pub fn bind_scene(&mut self, queue: CommandQueue) {
        self.scene = Some(queue);
    }

    /// Drop the link to the owning scene. Called by the scene when the entity
    /// is detached.
    pub fn unbind_scene(&mut self) {
        self.scene = None;
    }

    /// Install `component`, replacing any component of the same type, and
    /// request re-evaluation at the next synchronization.
    pub fn add_component<T: Component>(&mut self, component: T) {
        self.components.insert(component);
        self.refresh();
    }

    /// Install a type-erased component under `type_id`.
    pub fn add_component_with_id(&mut self, type_id: ComponentTypeId, component: Box<dyn AnyComponent>) {
        self.components.add(type_id, component);
        self.refresh();
    }

    /// Install a type-erased component under its own type id.
    pub fn add_boxed(&mut self, component: Box<dyn AnyComponent>) {
        self.components.add_boxed(component);
        self.refresh();
    }

    /// Drop the component of type `T`. A no-op when absent.
    pub fn remove_component<T: Component>(&mut self) {
        if let Some(type_id) = ComponentTypeId::registered::<T>() {
            self.remove_component_id(type_id);
        }
    }

    /// Drop the component with this type id. A no-op when absent.
    pub fn remove_component_id(&mut self, type_id: ComponentTypeId) {
        if self.components.remove(type_id) {
            self.refresh();
        }
    }

    /// Typed accessor.
    #[must_use]
    pub fn get_component<T: Component>(&self) -> Option<&T> {
        self.components.get_typed::<T>()
    }

    /// Typed mutable accessor.
    pub fn get_component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.components.get_typed_mut::<T>()
    }

    #[must_use]
    pub fn get_component_by_id(&self, type_id: ComponentTypeId) -> Option<&dyn AnyComponent> {
        self.components.get(type_id)
    }

    pub fn get_component_by_id_mut(&mut self, type_id: ComponentTypeId) -> Option<&mut dyn AnyComponent> {
        self.components.get_mut(type_id)
    }

    /// Stringly-typed lookup for callers without static types.
    #[must_use]
    pub fn get_component_by_name(&self, name: &str) -> Option<&dyn AnyComponent> {
        self.components.get_by_name(name)
    }

    pub fn get_component_by_name_mut(&mut self, name: &str) -> Option<&mut dyn AnyComponent> {
        self.components.get_by_name_mut(name)
    }

    #[must_use]
    pub fn has_component<T: Component>(&self) -> bool {
        ComponentTypeId::registered::<T>().is_some_and(|type_id| self.components.has(type_id))
    }

    #[must_use]
    pub fn has_component_id(&self, type_id: ComponentTypeId) -> bool {
        self.components.has(type_id)
    }

    /// Drop every component. The entity keeps its id and its scene.
    pub fn remove_all_components(&mut self) {
        if !self.components.is_empty() {
            self.components.clear();
            self.refresh();
        }
    }

    /// Ask the owning scene to re-evaluate this entity against every system
    /// at the next synchronization.
    pub fn refresh(&self) {
        if let Some(scene) = &self.scene {
            scene.refresh(self.id);
        }
    }

    /// Ask the owning scene to destroy this entity at the next
    /// synchronization.
    ///
    /// The entity is deactivated immediately so it is not processed again
    /// while it waits; it stays queryable until then.
    pub fn kill(&mut self) {
        match &self.scene {
            Some(scene) => {
                self.active = false;
                scene.kill(self.id);
            }
            None => debug!(entity = %self.id, "kill ignored: entity is not in a scene"),
        }
    }

    /// Ask the owning scene to release this entity, without destroying it or
    /// its components, at the next synchronization.
    pub fn detach(&self) {
        match &self.scene {
            Some(scene) => scene.detach(self.id),
            None => debug!(entity = %self.id, "detach ignored: entity is not in a scene"),
        }
    }

    /// Snapshot the current components as a named template.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Encode`] if a component fails to serialise.
    pub fn to_template(&self, name: impl Into<String>) -> Result<Template, ComponentError> {
        Template::from_storage(name, &self.components)
    }

    /// Hand the current component set to a template store under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the sink rejects the template.
    pub fn save<S: TemplateSink + ?Sized>(&self, name: &str, sink: &mut S) -> Result<(), ComponentError> {
        let template = self.to_template(name)?;
        sink.store_template(template)
    }

    /// Activate or deactivate this entity for processing. Does not affect
    /// which systems monitor it.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Copy every component of `other` into this entity.
    ///
    /// Components of the same type are overwritten, all others on `self` are
    /// left untouched.
    pub fn clone_from(&mut self, other: &Entity) {
        if other.components.is_empty() {
            return;
        }
        for (type_id, component) in other.components.iter() {
            self.components.add(type_id, component.clone_boxed());
        }
        self.refresh();
    }

    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Read access to the full component storage.
    #[must_use]
    pub fn components(&self) -> &ComponentStorage {
        &self.components
    }

    /// Write access to the full component storage.
    ///
    /// Changes made through this reference do not request re-evaluation;
    /// call [`refresh`](Entity::refresh) after adding or removing types.
    pub fn components_mut(&mut self) -> &mut ComponentStorage {
        &mut self.components
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether this entity is attached to a scene.
    #[must_use]
    pub fn in_scene(&self) -> bool {
        self.scene.is_some()
    }
}
