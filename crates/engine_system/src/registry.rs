//! System registry: the systems a scene runs, in registration order.
//!
//! Registration order is execution order, both for the synchronization
//! pass (which systems see an entity first) and for processing. At most one
//! system of each concrete type may be registered.

use std::collections::HashMap;

use tracing::debug;

use crate::error::SystemError;
use crate::system::{BaseSystem, System, SystemTypeId};

/// Position of a system within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemHandle(usize);

impl SystemHandle {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Ordered collection of [`BaseSystem`]s, at most one per concrete type.
#[derive(Debug, Default)]
pub struct SystemRegistry {
    systems: Vec<BaseSystem>,
    by_type: HashMap<SystemTypeId, SystemHandle>,
}

impl SystemRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
            by_type: HashMap::new(),
        }
    }

    /// Append a system to the end of the execution order.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::Duplicate`] if a system of the same concrete
    /// type is already registered; the registry is left unchanged.
    pub fn register(&mut self, system: BaseSystem) -> Result<SystemHandle, SystemError> {
        let type_id = system.system_type_id();
        if self.by_type.contains_key(&type_id) {
            return Err(SystemError::Duplicate {
                name: system.name(),
            });
        }

        let handle = SystemHandle(self.systems.len());
        debug!(
            system = system.name(),
            groups = system.requirements().len(),
            "system registered"
        );
        self.systems.push(system);
        self.by_type.insert(type_id, handle);
        Ok(handle)
    }

    #[must_use]
    pub fn get(&self, handle: SystemHandle) -> Option<&BaseSystem> {
        self.systems.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: SystemHandle) -> Option<&mut BaseSystem> {
        self.systems.get_mut(handle.0)
    }

    /// Look up the registered system of concrete type `S`.
    #[must_use]
    pub fn of<S: System>(&self) -> Option<&BaseSystem> {
        let handle = self.by_type.get(&SystemTypeId::of::<S>())?;
        self.systems.get(handle.0)
    }

    pub fn of_mut<S: System>(&mut self) -> Option<&mut BaseSystem> {
        let handle = self.by_type.get(&SystemTypeId::of::<S>())?;
        self.systems.get_mut(handle.0)
    }

    /// Returns the systems in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &BaseSystem> {
        self.systems.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BaseSystem> {
        self.systems.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}
