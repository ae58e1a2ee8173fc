//! Deferred structural commands.
//!
//! Structural changes that affect which systems monitor an entity are never
//! applied to system state in place. They are queued as [`Command`]s through
//! a [`CommandQueue`] and drained by the owning scene exactly once per
//! synchronization pass. Commands queued while a pass is running (for example
//! from a system's attach or detach callback) wait for the next pass.

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use crate::component::{AnyComponent, Component, ComponentTypeId};
use crate::entity::{EntityAllocator, EntityId};

/// A queued structural change.
#[derive(Debug)]
pub enum Command {
    /// Create an entity with a pre-reserved id and initial components.
    Spawn {
        entity: EntityId,
        components: Vec<Box<dyn AnyComponent>>,
    },
    /// Install a component, replacing any existing one of the same type.
    AddComponent {
        entity: EntityId,
        component: Box<dyn AnyComponent>,
    },
    /// Drop a component if present.
    RemoveComponent {
        entity: EntityId,
        type_id: ComponentTypeId,
    },
    /// Re-evaluate the entity against every system's requirements.
    Refresh(EntityId),
    /// Activate or deactivate the entity for processing.
    SetActive { entity: EntityId, active: bool },
    /// Destroy the entity.
    Kill(EntityId),
    /// Remove the entity from its scene without destroying it.
    Detach(EntityId),
}

impl Command {
    /// The entity this command targets.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        match self {
            Command::Spawn { entity, .. }
            | Command::AddComponent { entity, .. }
            | Command::RemoveComponent { entity, .. }
            | Command::SetActive { entity, .. } => *entity,
            Command::Refresh(entity) | Command::Kill(entity) | Command::Detach(entity) => *entity,
        }
    }
}

/// Create a connected queue/receiver pair drawing ids from `allocator`.
#[must_use]
pub fn command_queue(allocator: EntityAllocator) -> (CommandQueue, CommandReceiver) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    (
        CommandQueue { sender, allocator },
        CommandReceiver { receiver },
    )
}

/// Cloneable handle for queueing structural changes against a scene.
///
/// Every entity that belongs to a scene holds one of these; systems receive
/// one through their per-tick context.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    sender: Sender<Command>,
    allocator: EntityAllocator,
}

impl CommandQueue {
    /// Queue a raw command.
    pub fn push(&self, command: Command) {
        if let Err(err) = self.sender.send(command) {
            debug!(entity = %err.0.entity(), "command dropped: scene no longer exists");
        }
    }

    /// Reserve an id and queue the creation of an entity with `components`.
    ///
    /// The id is valid immediately so callers can queue further commands
    /// against it; the entity itself exists after the next synchronization.
    pub fn spawn(&self, components: Vec<Box<dyn AnyComponent>>) -> EntityId {
        let entity = self.allocator.allocate();
        self.push(Command::Spawn { entity, components });
        entity
    }

    /// Queue adding a typed component.
    pub fn add_component<T: Component>(&self, entity: EntityId, component: T) {
        self.add_boxed(entity, Box::new(component));
    }

    /// Queue adding a type-erased component.
    pub fn add_boxed(&self, entity: EntityId, component: Box<dyn AnyComponent>) {
        self.push(Command::AddComponent { entity, component });
    }

    /// Queue removing a typed component.
    pub fn remove_component<T: Component>(&self, entity: EntityId) {
        self.remove_component_id(entity, T::component_type_id());
    }

    /// Queue removing a component by type id.
    pub fn remove_component_id(&self, entity: EntityId, type_id: ComponentTypeId) {
        self.push(Command::RemoveComponent { entity, type_id });
    }

    pub fn refresh(&self, entity: EntityId) {
        self.push(Command::Refresh(entity));
    }

    pub fn set_active(&self, entity: EntityId, active: bool) {
        self.push(Command::SetActive { entity, active });
    }

    pub fn kill(&self, entity: EntityId) {
        self.push(Command::Kill(entity));
    }

    pub fn detach(&self, entity: EntityId) {
        self.push(Command::Detach(entity));
    }

    /// The allocator this queue reserves spawn ids from.
    #[must_use]
    pub fn allocator(&self) -> &EntityAllocator {
        &self.allocator
    }

    /// Returns `true` if both handles feed the same receiver.
    #[must_use]
    pub fn same_queue(&self, other: &CommandQueue) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

/// Receiving end of a [`CommandQueue`], owned by the scene.
#[derive(Debug)]
pub struct CommandReceiver {
    receiver: Receiver<Command>,
}

impl CommandReceiver {
    /// Take every command queued so far, in FIFO order.
    ///
    /// Commands queued after this call returns are left for the next drain.
    #[must_use]
    pub fn drain(&self) -> Vec<Command> {
        self.receiver.try_iter().collect()
    }

    /// Number of commands waiting.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Drop every waiting command. Returns how many were discarded.
    pub fn discard(&self) -> usize {
        self.receiver.try_iter().count()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Marker;

    impl Component for Marker {
        fn type_name() -> &'static str {
            "command::tests::Marker"
        }
    }

    #[test]
    fn test_commands_drain_in_order() {
        let (queue, receiver) = command_queue(EntityAllocator::new());
        let e = EntityId::from_raw(7);
        queue.add_component(e, Marker);
        queue.refresh(e);
        queue.kill(e);
        assert_eq!(receiver.pending(), 3);

        let drained = receiver.drain();
        assert_eq!(drained.len(), 3);
        assert!(matches!(drained[0], Command::AddComponent { .. }));
        assert!(matches!(drained[1], Command::Refresh(id) if id == e));
        assert!(matches!(drained[2], Command::Kill(id) if id == e));
        assert_eq!(receiver.pending(), 0);
    }

    #[test]
    fn test_spawn_reserves_id_immediately() {
        let allocator = EntityAllocator::new();
        let (queue, receiver) = command_queue(allocator.clone());
        let first = queue.spawn(vec![Box::new(Marker)]);
        let second = queue.spawn(Vec::new());
        assert_ne!(first, second);
        assert_eq!(allocator.count(), 2);

        let drained = receiver.drain();
        assert!(matches!(&drained[0], Command::Spawn { entity, components }
            if *entity == first && components.len() == 1));
    }

    #[test]
    fn test_commands_after_drain_wait_for_next() {
        let (queue, receiver) = command_queue(EntityAllocator::new());
        queue.refresh(EntityId::from_raw(1));
        let first = receiver.drain();
        queue.refresh(EntityId::from_raw(2));
        assert_eq!(first.len(), 1);
        assert_eq!(receiver.drain().len(), 1);
    }

    #[test]
    fn test_send_after_receiver_dropped_is_harmless() {
        let (queue, receiver) = command_queue(EntityAllocator::new());
        drop(receiver);
        queue.kill(EntityId::from_raw(1));
    }

    #[test]
    fn test_discard_and_same_queue() {
        let (queue, receiver) = command_queue(EntityAllocator::new());
        let clone = queue.clone();
        assert!(queue.same_queue(&clone));
        let (other, _other_receiver) = command_queue(EntityAllocator::new());
        assert!(!queue.same_queue(&other));

        clone.detach(EntityId::from_raw(3));
        queue.set_active(EntityId::from_raw(3), false);
        assert_eq!(receiver.discard(), 2);
        assert_eq!(receiver.pending(), 0);
    }
}
