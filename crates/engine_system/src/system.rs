//! The [`System`] extension trait and the [`BaseSystem`] that drives it.
//!
//! A concrete system implements [`System`]: five lifecycle/processing hooks.
//! Wrapping it in a [`BaseSystem`] adds everything shared by all systems:
//! requirement groups, the monitored set, the active flag and the state
//! machine that fires the hooks.
//!
//! ## Monitoring state machine
//!
//! Evaluated per entity at each synchronization pass:
//!
//! ```text
//! unmonitored --(satisfies a group)--------> monitored     on_attach
//! monitored   --(still satisfies a group)--> monitored     (nothing)
//! monitored   --(satisfies no group)-------> unmonitored   on_detach
//! monitored   --(entity killed)------------> unmonitored   on_kill, on_detach
//! ```
//!
//! The monitored set is only ever changed by [`BaseSystem::refresh_entity`],
//! [`BaseSystem::remove_entity`] and [`BaseSystem::clear_system`], all of
//! which the scene calls during its synchronization pass. Processing borrows
//! the set immutably, so it cannot change mid-iteration.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use engine_component::{Entity, EntityId, TypeIndex};
use tracing::{debug, trace};

use crate::context::SystemContext;
use crate::requirement::RequirementGroup;

/// A unique identifier for a concrete system type, assigned on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemTypeId(pub u32);

static SYSTEM_TYPES: LazyLock<TypeIndex> = LazyLock::new(TypeIndex::new);

impl SystemTypeId {
    /// Returns the id for system type `S`.
    #[must_use]
    pub fn of<S: System>() -> Self {
        Self(SYSTEM_TYPES.assign::<S>().0)
    }
}

impl fmt::Display for SystemTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "System#{}", self.0)
    }
}

/// Behaviour supplied by each concrete system.
///
/// The lifecycle hooks default to doing nothing; `process_entity` is the one
/// every system must provide.
pub trait System: Send + 'static {
    /// Human-readable name, used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// The entity started satisfying this system's requirements.
    fn on_attach(&mut self, _entity: &mut Entity) {}

    /// The entity stopped being monitored by this system.
    fn on_detach(&mut self, _entity: &mut Entity) {}

    /// The entity is being destroyed. Fired just before
    /// [`on_detach`](System::on_detach).
    fn on_kill(&mut self, _entity: &mut Entity) {}

    /// The system is being bulk-reset by [`BaseSystem::clear_system`].
    fn on_clear(&mut self) {}

    /// Process one monitored, active entity.
    fn process_entity(&mut self, entity: &mut Entity, ctx: &SystemContext);
}

/// Object-safe access to the concrete system for downcasting.
trait SystemObject: System {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<S: System> SystemObject for S {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Result of re-evaluating one entity against a system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorChange {
    /// The entity started being monitored.
    Attached,
    /// The entity stopped being monitored.
    Detached,
    /// Monitoring status did not change.
    Unchanged,
}

/// Shared system state plus the concrete [`System`] it drives.
pub struct BaseSystem {
    type_id: SystemTypeId,
    name: &'static str,
    requirements: Vec<RequirementGroup>,
    monitored: BTreeSet<EntityId>,
    active: bool,
    logic: Box<dyn SystemObject>,
}

impl BaseSystem {
    /// Wrap a concrete system. It starts active, with no requirement groups
    /// (and therefore matching nothing).
    #[must_use]
    pub fn new<S: System>(system: S) -> Self {
        Self {
            type_id: SystemTypeId::of::<S>(),
            name: system.name(),
            requirements: Vec::new(),
            monitored: BTreeSet::new(),
            active: true,
            logic: Box::new(system),
        }
    }

    /// Builder form of [`add_requirement`](Self::add_requirement).
    #[must_use]
    pub fn with_requirement(mut self, group: RequirementGroup) -> Self {
        self.add_requirement(group);
        self
    }

    /// Append a requirement group.
    ///
    /// Entities already in the scene are not re-evaluated here; they pick up
    /// the new group the next time they are refreshed.
    pub fn add_requirement(&mut self, group: RequirementGroup) {
        self.requirements.push(group);
    }

    #[must_use]
    pub fn requirements(&self) -> &[RequirementGroup] {
        &self.requirements
    }

    /// Returns `true` if `entity` satisfies at least one requirement group.
    ///
    /// Groups are tried in registration order and evaluation stops at the
    /// first satisfied one.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        self.requirements
            .iter()
            .any(|group| group.is_satisfied_by(entity))
    }

    /// Re-evaluate `entity` and update the monitored set, firing
    /// `on_attach`/`on_detach` on a status change.
    pub fn refresh_entity(&mut self, entity: &mut Entity) -> MonitorChange {
        let id = entity.id();
        let matches = self.matches(entity);
        let monitored = self.monitored.contains(&id);

        match (matches, monitored) {
            (true, false) => {
                self.monitored.insert(id);
                trace!(system = self.name, entity = %id, "attach");
                self.logic.on_attach(entity);
                MonitorChange::Attached
            }
            (false, true) => {
                self.monitored.remove(&id);
                trace!(system = self.name, entity = %id, "detach");
                self.logic.on_detach(entity);
                MonitorChange::Detached
            }
            _ => MonitorChange::Unchanged,
        }
    }

    /// Stop monitoring `entity` because it is leaving the scene.
    ///
    /// Fires `on_kill` (when `was_killed`) and then `on_detach`. Removing an
    /// entity that is not monitored is a no-op. Returns whether it was
    /// monitored.
    pub fn remove_entity(&mut self, entity: &mut Entity, was_killed: bool) -> bool {
        if !self.monitored.remove(&entity.id()) {
            return false;
        }
        trace!(system = self.name, entity = %entity.id(), was_killed, "remove");
        if was_killed {
            self.logic.on_kill(entity);
        }
        self.logic.on_detach(entity);
        true
    }

    /// Run `process_entity` for every monitored entity that is active.
    ///
    /// Inactive entities are skipped but stay monitored. Does nothing while
    /// the system itself is inactive. Returns how many entities were
    /// processed.
    pub fn process_entities(
        &mut self,
        entities: &mut BTreeMap<EntityId, Entity>,
        ctx: &SystemContext,
    ) -> usize {
        if !self.active {
            return 0;
        }

        let mut processed = 0;
        for id in &self.monitored {
            let Some(entity) = entities.get_mut(id) else {
                debug!(system = self.name, entity = %id, "monitored entity missing from scene");
                continue;
            };
            if entity.is_active() {
                self.logic.process_entity(entity, ctx);
                processed += 1;
            }
        }
        processed
    }

    /// Toggle whether this system runs. An inactive system keeps its
    /// monitored set up to date but skips processing.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Bulk reset: fire `on_clear` once, then forget every monitored entity.
    ///
    /// Unlike [`remove_entity`](Self::remove_entity) this does **not** fire
    /// `on_detach` per entity.
    pub fn clear_system(&mut self) {
        self.logic.on_clear();
        let dropped = self.monitored.len();
        self.monitored.clear();
        debug!(system = self.name, dropped, "system cleared");
    }

    /// Ids of the entities currently monitored, in id order.
    #[must_use]
    pub fn entities(&self) -> &BTreeSet<EntityId> {
        &self.monitored
    }

    #[must_use]
    pub fn is_monitoring(&self, id: EntityId) -> bool {
        self.monitored.contains(&id)
    }

    #[must_use]
    pub fn system_type_id(&self) -> SystemTypeId {
        self.type_id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Borrow the concrete system, if it is an `S`.
    #[must_use]
    pub fn logic<S: System>(&self) -> Option<&S> {
        self.logic.as_any().downcast_ref::<S>()
    }

    /// Mutably borrow the concrete system, if it is an `S`.
    pub fn logic_mut<S: System>(&mut self) -> Option<&mut S> {
        self.logic.as_any_mut().downcast_mut::<S>()
    }
}

impl fmt::Debug for BaseSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseSystem")
            .field("type_id", &self.type_id)
            .field("name", &self.name)
            .field("requirements", &self.requirements)
            .field("monitored", &self.monitored)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
