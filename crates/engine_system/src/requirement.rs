//! Requirement groups: the component sets a system is interested in.
//!
//! A system registers one or more [`RequirementGroup`]s. An entity satisfies
//! a group when it has **every** component type in it; it satisfies the
//! system when it satisfies **any** of the system's groups.

use engine_component::{Component, ComponentTypeId, Entity};

/// An AND-set of component types.
///
/// Types keep their insertion order so evaluation is deterministic;
/// duplicates are ignored. An empty group is satisfied by every entity.
///
/// Groups hold process-local type ids, so they are rebuilt from types at
/// startup rather than persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementGroup {
    types: Vec<ComponentTypeId>,
}

impl RequirementGroup {
    /// Create an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self { types: Vec::new() }
    }

    /// Require component type `T`.
    #[must_use]
    pub fn with<T: Component>(self) -> Self {
        self.with_id(T::component_type_id())
    }

    /// Require the component type with this id.
    #[must_use]
    pub fn with_id(mut self, type_id: ComponentTypeId) -> Self {
        if !self.types.contains(&type_id) {
            self.types.push(type_id);
        }
        self
    }

    /// Build a group from a list of type ids.
    #[must_use]
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = ComponentTypeId>,
    {
        ids.into_iter().fold(Self::new(), Self::with_id)
    }

    /// The required types, in registration order.
    #[must_use]
    pub fn types(&self) -> &[ComponentTypeId] {
        &self.types
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Returns `true` if `entity` has every component type in this group.
    #[must_use]
    pub fn is_satisfied_by(&self, entity: &Entity) -> bool {
        self.types.iter().all(|&ty| entity.has_component_id(ty))
    }
}
