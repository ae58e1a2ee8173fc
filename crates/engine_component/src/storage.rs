//! Per-entity component storage.
//!
//! A [`ComponentStorage`] maps each [`ComponentTypeId`] to at most one owned,
//! type-erased component. It owns component lifetime: replacing, removing or
//! clearing a component drops it.

use std::collections::BTreeMap;

use crate::component::{AnyComponent, Component, ComponentTypeId};

/// Owned components of a single entity, keyed by component type.
///
/// Iteration order follows [`ComponentTypeId`] so it is deterministic within
/// a process.
#[derive(Debug, Default)]
pub struct ComponentStorage {
    components: BTreeMap<ComponentTypeId, Box<dyn AnyComponent>>,
}

impl ComponentStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: BTreeMap::new(),
        }
    }

    /// Store `component` under `type_id`, dropping any previous instance of
    /// that type. Overwriting is silent.
    ///
    /// `type_id` must be the component's own type id.
    pub fn add(&mut self, type_id: ComponentTypeId, component: Box<dyn AnyComponent>) {
        debug_assert_eq!(
            type_id,
            component.component_id(),
            "component stored under a foreign type id"
        );
        self.components.insert(type_id, component);
    }

    /// Store a type-erased component under its own type id.
    pub fn add_boxed(&mut self, component: Box<dyn AnyComponent>) {
        let type_id = component.component_id();
        self.components.insert(type_id, component);
    }

    /// Store a typed component.
    pub fn insert<T: Component>(&mut self, component: T) {
        self.components
            .insert(T::component_type_id(), Box::new(component));
    }

    /// Drop the component of this type. Returns `true` if one was present.
    pub fn remove(&mut self, type_id: ComponentTypeId) -> bool {
        self.components.remove(&type_id).is_some()
    }

    /// Remove the component of this type and hand it to the caller.
    pub fn take(&mut self, type_id: ComponentTypeId) -> Option<Box<dyn AnyComponent>> {
        self.components.remove(&type_id)
    }

    /// Returns the component of this type, if present.
    #[must_use]
    pub fn get(&self, type_id: ComponentTypeId) -> Option<&dyn AnyComponent> {
        self.components.get(&type_id).map(|component| &**component)
    }

    /// Returns the component of this type mutably, if present.
    pub fn get_mut(&mut self, type_id: ComponentTypeId) -> Option<&mut dyn AnyComponent> {
        self.components
            .get_mut(&type_id)
            .map(|component| &mut **component)
    }

    /// Typed lookup.
    #[must_use]
    pub fn get_typed<T: Component>(&self) -> Option<&T> {
        self.get(ComponentTypeId::registered::<T>()?)?.downcast_ref::<T>()
    }

    /// Typed mutable lookup.
    pub fn get_typed_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.get_mut(ComponentTypeId::registered::<T>()?)?.downcast_mut::<T>()
    }

    /// Returns `true` if a component of this type is stored.
    #[must_use]
    pub fn has(&self, type_id: ComponentTypeId) -> bool {
        self.components.contains_key(&type_id)
    }

    /// Drop every component.
    pub fn clear(&mut self) {
        self.components.clear();
    }

    /// Returns the number of stored components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if no components are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterate the stored component type ids.
    pub fn type_ids(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.components.keys().copied()
    }

    /// Iterate the stored components.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentTypeId, &dyn AnyComponent)> {
        self.components
            .iter()
            .map(|(id, component)| (*id, &**component))
    }

    /// Iterate the stored components mutably.
    ///
    /// Keys cannot be changed through this iterator, so the one-per-type
    /// invariant holds.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ComponentTypeId, &mut dyn AnyComponent)> {
        self.components
            .iter_mut()
            .map(|(id, component)| (*id, &mut **component))
    }

    /// Iterate the stored components keyed by their registered name, the
    /// view used by untyped callers such as script bindings.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, &dyn AnyComponent)> {
        self.components
            .values()
            .map(|component| (component.component_name(), &**component))
    }

    /// Returns the component registered under `name`, if this storage holds
    /// one.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&dyn AnyComponent> {
        self.get(ComponentTypeId::from_name(name)?)
    }

    /// Mutable by-name lookup.
    pub fn get_by_name_mut(&mut self, name: &str) -> Option<&mut dyn AnyComponent> {
        self.get_mut(ComponentTypeId::from_name(name)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Position {
        x: i32,
        y: i32,
    }

    impl Component for Position {
        fn type_name() -> &'static str {
            "storage::tests::Position"
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tag(String);

    impl Component for Tag {
        fn type_name() -> &'static str {
            "storage::tests::Tag"
        }
    }

    /// Counts drops through a shared counter; the counter is skipped by serde.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct DropProbe {
        #[serde(skip)]
        drops: Arc<AtomicUsize>,
    }

    impl Drop for DropProbe {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Component for DropProbe {
        fn type_name() -> &'static str {
            "storage::tests::DropProbe"
        }
    }

    #[test]
    fn test_add_and_get() {
        let mut storage = ComponentStorage::new();
        storage.insert(Position { x: 1, y: 2 });
        assert!(storage.has(Position::component_type_id()));
        assert_eq!(storage.get_typed::<Position>(), Some(&Position { x: 1, y: 2 }));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_add_overwrites_silently() {
        let mut storage = ComponentStorage::new();
        storage.insert(Position { x: 1, y: 2 });
        storage.add(
            Position::component_type_id(),
            Box::new(Position { x: 5, y: 6 }),
        );
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get_typed::<Position>(), Some(&Position { x: 5, y: 6 }));
    }

    #[test]
    fn test_overwrite_drops_previous_instance() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut storage = ComponentStorage::new();
        storage.insert(DropProbe {
            drops: drops.clone(),
        });
        storage.insert(DropProbe {
            drops: drops.clone(),
        });
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        storage.clear();
        assert_eq!(drops.load(Ordering::SeqCst), 2);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut storage = ComponentStorage::new();
        assert!(!storage.remove(Position::component_type_id()));
        storage.insert(Tag("a".into()));
        assert!(!storage.remove(Position::component_type_id()));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_get_absent_returns_none() {
        let storage = ComponentStorage::new();
        assert!(storage.get(Position::component_type_id()).is_none());
        assert!(storage.get_typed::<Tag>().is_none());
    }

    #[test]
    fn test_get_typed_mut() {
        let mut storage = ComponentStorage::new();
        storage.insert(Position { x: 0, y: 0 });
        if let Some(position) = storage.get_typed_mut::<Position>() {
            position.x = 10;
        }
        assert_eq!(storage.get_typed::<Position>().map(|p| p.x), Some(10));
    }

    #[test]
    fn test_named_lookup() {
        let mut storage = ComponentStorage::new();
        storage.insert(Tag("player".into()));
        let tag = storage
            .get_by_name("storage::tests::Tag")
            .and_then(|c| c.downcast_ref::<Tag>());
        assert_eq!(tag, Some(&Tag("player".into())));
        assert!(storage.get_by_name("storage::tests::Unknown").is_none());

        let names: Vec<&str> = storage.named().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["storage::tests::Tag"]);
    }

    #[test]
    fn test_take_hands_out_ownership() {
        let mut storage = ComponentStorage::new();
        storage.insert(Tag("x".into()));
        let taken = storage.take(Tag::component_type_id());
        assert!(taken.is_some());
        assert!(storage.is_empty());
    }
}
