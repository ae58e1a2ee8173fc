//! The scene: owner of every live entity and of the systems that watch them.
//!
//! The [`Scene`] issues entity ids, holds entities by value keyed by id, and
//! runs the synchronization pass that turns queued structural commands into
//! system monitoring changes. Systems refer to entities only by id, so no
//! reference into the scene outlives a pass.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, trace, warn};

use engine_component::{
    Command, CommandQueue, CommandReceiver, ComponentError, Entity, EntityAllocator, EntityId,
    Template, command_queue,
};
use engine_system::{
    BaseSystem, MonitorChange, System, SystemContext, SystemError, SystemHandle, SystemRegistry,
};

use crate::error::SceneError;

/// What one synchronization pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Commands drained from the queue.
    pub commands: usize,
    /// Entities created from `Spawn` commands.
    pub spawned: usize,
    /// Entities destroyed.
    pub killed: usize,
    /// Entities released from the scene without being destroyed.
    pub released: usize,
    /// Entities re-evaluated against the systems.
    pub refreshed: usize,
    /// `on_attach` calls fired.
    pub attached: usize,
    /// `on_detach` calls fired.
    pub detached: usize,
}

/// Bookkeeping for the pass in progress.
#[derive(Default)]
struct Pass {
    dirty: BTreeSet<EntityId>,
    detaches: Vec<EntityId>,
    kills: Vec<EntityId>,
}

/// Entity registry plus system registry.
#[derive(Debug)]
pub struct Scene {
    allocator: EntityAllocator,
    entities: BTreeMap<EntityId, Entity>,
    systems: SystemRegistry,
    queue: CommandQueue,
    receiver: CommandReceiver,
    detached: Vec<Entity>,
}

impl Scene {
    /// Create an empty scene with its own id space.
    #[must_use]
    pub fn new() -> Self {
        Self::with_allocator(EntityAllocator::new())
    }

    /// Create an empty scene drawing ids from `allocator`. Scenes sharing an
    /// allocator never hand out the same id, so entities can move between
    /// them with [`attach_entity`](Self::attach_entity).
    #[must_use]
    pub fn with_allocator(allocator: EntityAllocator) -> Self {
        let (queue, receiver) = command_queue(allocator.clone());
        Self {
            allocator,
            entities: BTreeMap::new(),
            systems: SystemRegistry::new(),
            queue,
            receiver,
            detached: Vec::new(),
        }
    }

    // --- Entities ---------------------------------------------------------

    /// Create an empty, active entity.
    ///
    /// The entity exists immediately; systems see it at the next
    /// [`synchronize`](Self::synchronize).
    pub fn create_entity(&mut self) -> &mut Entity {
        let id = self.allocator.allocate();
        let mut entity = Entity::new(id);
        entity.bind_scene(self.queue.clone());
        entity.refresh();
        trace!(entity = %id, "entity created");
        debug_assert!(!self.entities.contains_key(&id), "allocator issued a live id");
        match self.entities.entry(id) {
            Entry::Vacant(slot) => slot.insert(entity),
            Entry::Occupied(mut slot) => {
                slot.insert(entity);
                slot.into_mut()
            }
        }
    }

    /// Create an entity holding a fresh copy of every component in
    /// `template`.
    ///
    /// # Errors
    ///
    /// Fails if a component cannot be decoded; the scene is left unchanged.
    pub fn spawn_from_template(&mut self, template: &Template) -> Result<EntityId, ComponentError> {
        let components = template.instantiate()?;
        let entity = self.create_entity();
        for component in components {
            entity.components_mut().add_boxed(component);
        }
        debug!(entity = %entity.id(), template = %template.name, "spawned from template");
        Ok(entity.id())
    }

    /// Adopt an entity that is not in any scene, typically one previously
    /// released by a detach.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnissuedEntity`] if the id was not handed out by
    /// this scene's allocator (including [`EntityId::INVALID`]), since the
    /// allocator would later issue it again. Returns
    /// [`SceneError::DuplicateEntity`] if an entity with the same id is
    /// already live here. On error the entity is dropped.
    pub fn attach_entity(&mut self, mut entity: Entity) -> Result<EntityId, SceneError> {
        let id = entity.id();
        if !id.is_valid() || id.id() > self.allocator.count() {
            return Err(SceneError::UnissuedEntity(id));
        }
        if self.entities.contains_key(&id) {
            return Err(SceneError::DuplicateEntity(id));
        }
        entity.bind_scene(self.queue.clone());
        entity.refresh();
        self.entities.insert(id, entity);
        debug!(entity = %id, "entity attached");
        Ok(id)
    }

    /// Hand over every entity released by a detach since the last call.
    ///
    /// Released entities accumulate here until taken; an owner that never
    /// calls this keeps them alive for the life of the scene.
    pub fn take_detached(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.detached)
    }

    /// Number of released entities waiting for [`Scene::take_detached`].
    #[must_use]
    pub fn detached_count(&self) -> usize {
        self.detached.len()
    }

    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns an iterator over all live entities, in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Queue destruction of `id`; see [`Entity::kill`]. Returns `false` if
    /// the entity is unknown.
    pub fn kill_entity(&mut self, id: EntityId) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.kill();
                true
            }
            None => false,
        }
    }

    /// Queue release of `id` from the scene; see [`Entity::detach`].
    pub fn detach_entity(&mut self, id: EntityId) -> bool {
        match self.entities.get(&id) {
            Some(entity) => {
                entity.detach();
                true
            }
            None => false,
        }
    }

    /// Queue an active-flag change for `id`.
    pub fn set_entity_active(&mut self, id: EntityId, active: bool) -> bool {
        if !self.entities.contains_key(&id) {
            return false;
        }
        self.queue.set_active(id, active);
        true
    }

    /// A handle for queueing structural changes against this scene.
    #[must_use]
    pub fn commands(&self) -> &CommandQueue {
        &self.queue
    }

    /// Number of commands waiting for the next synchronization.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.receiver.pending()
    }

    // --- Systems ----------------------------------------------------------

    /// Register a system after every system already registered.
    ///
    /// Entities already in the scene are evaluated against it the next time
    /// they are refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::Duplicate`] if a system of the same type is
    /// already registered.
    pub fn add_system(&mut self, system: BaseSystem) -> Result<SystemHandle, SystemError> {
        self.systems.register(system)
    }

    /// Borrow the concrete system of type `S`.
    #[must_use]
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems.of::<S>()?.logic::<S>()
    }

    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems.of_mut::<S>()?.logic_mut::<S>()
    }

    /// Borrow the shared state (monitored set, requirements, active flag) of
    /// the system of type `S`.
    #[must_use]
    pub fn base_system<S: System>(&self) -> Option<&BaseSystem> {
        self.systems.of::<S>()
    }

    pub fn base_system_mut<S: System>(&mut self) -> Option<&mut BaseSystem> {
        self.systems.of_mut::<S>()
    }

    #[must_use]
    pub fn systems(&self) -> &SystemRegistry {
        &self.systems
    }

    pub fn systems_mut(&mut self) -> &mut SystemRegistry {
        &mut self.systems
    }

    // --- Synchronization ----------------------------------------------------

    /// Apply every queued structural change and bring each system's
    /// monitored set up to date.
    ///
    /// In order:
    ///
    /// 1. Data commands (spawn, add/remove component, set active, refresh)
    ///    are applied in the order they were queued.
    /// 2. Detached entities leave every system (`on_detach`) and the scene.
    /// 3. Killed entities leave every system (`on_kill`, then `on_detach`)
    ///    and are destroyed. A kill overrides a detach of the same entity.
    /// 4. Every other entity touched by a command is re-evaluated by every
    ///    system, in registration order.
    ///
    /// Commands queued from within a callback are left for the next pass.
    pub fn synchronize(&mut self) -> SyncReport {
        let commands = self.receiver.drain();
        let mut report = SyncReport {
            commands: commands.len(),
            ..SyncReport::default()
        };
        if commands.is_empty() {
            return report;
        }

        let mut pass = Pass::default();
        for command in commands {
            self.apply(command, &mut pass, &mut report);
        }

        for id in pass.detaches {
            if pass.kills.contains(&id) {
                continue;
            }
            let Some(mut entity) = self.entities.remove(&id) else {
                debug!(entity = %id, "detach ignored: entity not in scene");
                continue;
            };
            for system in self.systems.iter_mut() {
                if system.remove_entity(&mut entity, false) {
                    report.detached += 1;
                }
            }
            entity.unbind_scene();
            pass.dirty.remove(&id);
            self.detached.push(entity);
            report.released += 1;
        }

        for id in pass.kills {
            let Some(mut entity) = self.entities.remove(&id) else {
                debug!(entity = %id, "kill ignored: entity not in scene");
                continue;
            };
            for system in self.systems.iter_mut() {
                if system.remove_entity(&mut entity, true) {
                    report.detached += 1;
                }
            }
            pass.dirty.remove(&id);
            report.killed += 1;
        }

        for id in pass.dirty {
            let Some(entity) = self.entities.get_mut(&id) else {
                continue;
            };
            report.refreshed += 1;
            for system in self.systems.iter_mut() {
                match system.refresh_entity(entity) {
                    MonitorChange::Attached => report.attached += 1,
                    MonitorChange::Detached => report.detached += 1,
                    MonitorChange::Unchanged => {}
                }
            }
        }

        debug!(
            commands = report.commands,
            spawned = report.spawned,
            killed = report.killed,
            released = report.released,
            attached = report.attached,
            detached = report.detached,
            "scene synchronized"
        );
        report
    }

    fn apply(&mut self, command: Command, pass: &mut Pass, report: &mut SyncReport) {
        match command {
            Command::Spawn { entity: id, components } => {
                if self.entities.contains_key(&id) {
                    warn!(entity = %id, "spawn ignored: id already in scene");
                    return;
                }
                let mut entity = Entity::new(id);
                entity.bind_scene(self.queue.clone());
                for component in components {
                    entity.components_mut().add_boxed(component);
                }
                self.entities.insert(id, entity);
                pass.dirty.insert(id);
                report.spawned += 1;
            }
            Command::AddComponent { entity: id, component } => {
                if let Some(entity) = self.live(id, "add component") {
                    entity.components_mut().add_boxed(component);
                    pass.dirty.insert(id);
                }
            }
            Command::RemoveComponent { entity: id, type_id } => {
                if let Some(entity) = self.live(id, "remove component")
                    && entity.components_mut().remove(type_id)
                {
                    pass.dirty.insert(id);
                }
            }
            Command::SetActive { entity: id, active } => {
                if let Some(entity) = self.live(id, "set active") {
                    entity.set_active(active);
                    pass.dirty.insert(id);
                }
            }
            Command::Refresh(id) => {
                if self.live(id, "refresh").is_some() {
                    pass.dirty.insert(id);
                }
            }
            Command::Kill(id) => {
                if !pass.kills.contains(&id) {
                    pass.kills.push(id);
                }
            }
            Command::Detach(id) => {
                if !pass.detaches.contains(&id) {
                    pass.detaches.push(id);
                }
            }
        }
    }

    fn live(&mut self, id: EntityId, action: &'static str) -> Option<&mut Entity> {
        let entity = self.entities.get_mut(&id);
        if entity.is_none() {
            debug!(entity = %id, action, "command ignored: entity not in scene");
        }
        entity
    }

    /// Run every active system over its monitored, active entities. Returns
    /// the number of `process_entity` calls made.
    pub fn process_systems(&mut self, ctx: &SystemContext) -> usize {
        self.systems
            .iter_mut()
            .map(|system| system.process_entities(&mut self.entities, ctx))
            .sum()
    }

    /// Bulk reset: clear every system (`on_clear`, no per-entity
    /// `on_detach`), destroy every entity and discard pending commands.
    pub fn clear(&mut self) {
        for system in self.systems.iter_mut() {
            system.clear_system();
        }
        let entities = self.entities.len();
        self.entities.clear();
        let discarded = self.receiver.discard();
        info!(entities, discarded, "scene cleared");
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use engine_component::{Component, TemplateLibrary, register_component};
    use engine_system::RequirementGroup;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tag(u32);
    impl Component for Tag {
        fn type_name() -> &'static str {
            "scene::tests::Tag"
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Other;
    impl Component for Other {
        fn type_name() -> &'static str {
            "scene::tests::Other"
        }
    }

    #[derive(Debug, Default)]
    struct Counter {
        attached: usize,
        detached: usize,
        killed: usize,
        processed: usize,
    }

    impl System for Counter {
        fn on_attach(&mut self, _entity: &mut Entity) {
            self.attached += 1;
        }
        fn on_detach(&mut self, _entity: &mut Entity) {
            self.detached += 1;
        }
        fn on_kill(&mut self, _entity: &mut Entity) {
            self.killed += 1;
        }
        fn process_entity(&mut self, _entity: &mut Entity, _ctx: &SystemContext) {
            self.processed += 1;
        }
    }

    /// Kills every entity it processes, through the deferred queue.
    struct Reaper;
    impl System for Reaper {
        fn process_entity(&mut self, entity: &mut Entity, ctx: &SystemContext) {
            ctx.commands.kill(entity.id());
        }
    }

    fn scene_with_counter() -> Scene {
        let mut scene = Scene::new();
        scene
            .add_system(
                BaseSystem::new(Counter::default())
                    .with_requirement(RequirementGroup::new().with::<Tag>()),
            )
            .unwrap();
        scene
    }

    fn ctx(scene: &Scene) -> SystemContext {
        SystemContext::new(1, 1.0 / 60.0, scene.commands().clone())
    }

    #[test]
    fn test_create_entity_assigns_unique_ids() {
        let mut scene = Scene::new();
        let a = scene.create_entity().id();
        let b = scene.create_entity().id();
        assert_ne!(a, b);
        assert!(scene.contains(a));
        assert!(scene.entity(b).unwrap().in_scene());
        assert_eq!(scene.entity_count(), 2);
    }

    #[test]
    fn test_attach_deferred_until_sync() {
        let mut scene = scene_with_counter();
        let id = scene.create_entity().id();
        scene.entity_mut(id).unwrap().add_component(Tag(1));
        assert_eq!(scene.system::<Counter>().unwrap().attached, 0);

        let report = scene.synchronize();
        assert_eq!(report.attached, 1);
        assert_eq!(scene.system::<Counter>().unwrap().attached, 1);
        assert!(scene.base_system::<Counter>().unwrap().is_monitoring(id));

        // Nothing queued: the next pass is empty.
        assert_eq!(scene.synchronize(), SyncReport::default());
    }

    #[test]
    fn test_kill_removes_and_fires_hooks() {
        let mut scene = scene_with_counter();
        let id = scene.create_entity().id();
        scene.entity_mut(id).unwrap().add_component(Tag(1));
        scene.synchronize();

        assert!(scene.kill_entity(id));
        assert!(!scene.entity(id).unwrap().is_active());
        assert!(scene.contains(id));

        let report = scene.synchronize();
        assert_eq!(report.killed, 1);
        assert!(!scene.contains(id));
        let counter = scene.system::<Counter>().unwrap();
        assert_eq!((counter.killed, counter.detached), (1, 1));
        assert!(!scene.kill_entity(id));
    }

    #[test]
    fn test_kill_wins_over_detach() {
        let mut scene = scene_with_counter();
        let id = scene.create_entity().id();
        scene.entity_mut(id).unwrap().add_component(Tag(1));
        scene.synchronize();

        scene.detach_entity(id);
        scene.kill_entity(id);
        let report = scene.synchronize();
        assert_eq!((report.killed, report.released), (1, 0));
        assert!(scene.take_detached().is_empty());
    }

    #[test]
    fn test_detach_and_reattach() {
        let mut scene = scene_with_counter();
        let id = scene.create_entity().id();
        scene.entity_mut(id).unwrap().add_component(Tag(7));
        scene.synchronize();

        assert!(scene.detach_entity(id));
        let report = scene.synchronize();
        assert_eq!(report.released, 1);
        assert!(!scene.contains(id));
        let counter = scene.system::<Counter>().unwrap();
        assert_eq!((counter.detached, counter.killed), (1, 0));

        let mut released = scene.take_detached();
        assert_eq!(released.len(), 1);
        let entity = released.pop().unwrap();
        assert!(!entity.in_scene());
        assert_eq!(entity.get_component::<Tag>(), Some(&Tag(7)));

        scene.attach_entity(entity).unwrap();
        scene.synchronize();
        assert_eq!(scene.system::<Counter>().unwrap().attached, 2);
    }

    #[test]
    fn test_attach_duplicate_id_rejected() {
        let mut scene = Scene::new();
        let id = scene.create_entity().id();
        let err = scene.attach_entity(Entity::new(id)).unwrap_err();
        assert!(matches!(err, SceneError::DuplicateEntity(dup) if dup == id));
    }

    #[test]
    fn test_attach_rejects_ids_from_another_allocator() {
        let mut source = Scene::new();
        let id = source.create_entity().id();
        source.entity_mut(id).unwrap().add_component(Tag(99));
        source.detach_entity(id);
        source.synchronize();
        let entity = source.take_detached().pop().unwrap();

        // A fresh scene has issued nothing yet, so id 1 would collide with
        // its own first entity.
        let mut target = Scene::new();
        let err = target.attach_entity(entity).unwrap_err();
        assert!(matches!(err, SceneError::UnissuedEntity(rejected) if rejected == id));

        let fresh = target.create_entity().id();
        assert_eq!(fresh, id);
        assert!(!target.entity(fresh).unwrap().has_component::<Tag>());
        assert_eq!(target.entity_count(), 1);
    }

    #[test]
    fn test_attach_rejects_invalid_id() {
        let mut scene = Scene::new();
        scene.create_entity();
        let err = scene.attach_entity(Entity::new(EntityId::INVALID)).unwrap_err();
        assert!(matches!(err, SceneError::UnissuedEntity(EntityId::INVALID)));
        assert_eq!(scene.entity_count(), 1);
    }

    #[test]
    fn test_move_between_scenes_sharing_allocator() {
        let allocator = EntityAllocator::new();
        let mut source = Scene::with_allocator(allocator.clone());
        let mut target = Scene::with_allocator(allocator);
        let id = source.create_entity().id();
        source.detach_entity(id);
        source.synchronize();

        let entity = source.take_detached().pop().unwrap();
        assert_eq!(target.attach_entity(entity).unwrap(), id);
        assert_ne!(target.create_entity().id(), id);
        assert_eq!(target.entity_count(), 2);
    }

    #[test]
    fn test_spawn_command_reserves_id() {
        let mut scene = scene_with_counter();
        let id = scene.commands().spawn(vec![Box::new(Tag(3))]);
        scene.commands().add_component(id, Other);
        assert!(!scene.contains(id));

        let report = scene.synchronize();
        assert_eq!(report.spawned, 1);
        let entity = scene.entity(id).unwrap();
        assert!(entity.has_component::<Other>());
        assert!(scene.base_system::<Counter>().unwrap().is_monitoring(id));
    }

    #[test]
    fn test_commands_from_processing_are_deferred() {
        let mut scene = Scene::new();
        scene
            .add_system(BaseSystem::new(Reaper).with_requirement(RequirementGroup::new()))
            .unwrap();
        let id = scene.create_entity().id();
        scene.synchronize();

        let ctx = ctx(&scene);
        assert_eq!(scene.process_systems(&ctx), 1);
        assert!(scene.contains(id));
        assert_eq!(scene.pending_commands(), 1);

        scene.synchronize();
        assert!(!scene.contains(id));
    }

    #[test]
    fn test_set_entity_active_is_queued() {
        let mut scene = scene_with_counter();
        let id = scene.create_entity().id();
        scene.entity_mut(id).unwrap().add_component(Tag(1));
        scene.synchronize();

        assert!(scene.set_entity_active(id, false));
        assert!(scene.entity(id).unwrap().is_active());
        scene.synchronize();
        assert!(!scene.entity(id).unwrap().is_active());

        let ctx = ctx(&scene);
        assert_eq!(scene.process_systems(&ctx), 0);
        assert!(scene.base_system::<Counter>().unwrap().is_monitoring(id));
    }

    #[test]
    fn test_spawn_from_template() {
        register_component::<Tag>();
        let mut scene = scene_with_counter();
        let original = scene.create_entity();
        original.add_component(Tag(42));
        let mut library = TemplateLibrary::new();
        original.save("tagged", &mut library).unwrap();

        let copy = scene
            .spawn_from_template(library.require("tagged").unwrap())
            .unwrap();
        scene.synchronize();
        assert_eq!(scene.entity(copy).unwrap().get_component::<Tag>(), Some(&Tag(42)));
        assert_eq!(scene.system::<Counter>().unwrap().attached, 2);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut scene = scene_with_counter();
        for n in 0..3 {
            scene.create_entity().add_component(Tag(n));
        }
        scene.synchronize();
        scene.create_entity();
        assert_eq!(scene.pending_commands(), 1);

        scene.clear();
        assert_eq!(scene.entity_count(), 0);
        assert_eq!(scene.pending_commands(), 0);
        let base = scene.base_system::<Counter>().unwrap();
        assert!(base.entities().is_empty());
        assert_eq!(scene.system::<Counter>().unwrap().detached, 0);
    }

    #[test]
    fn test_shared_allocator_keeps_ids_distinct() {
        let allocator = EntityAllocator::new();
        let mut a = Scene::with_allocator(allocator.clone());
        let mut b = Scene::with_allocator(allocator);
        let first = a.create_entity().id();
        let second = b.create_entity().id();
        assert_ne!(first, second);
    }
}
