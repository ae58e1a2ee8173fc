//! Core [`Component`] trait, its type-erased form and component type identity.
//!
//! Every piece of data attached to an entity implements [`Component`]. The
//! trait requires `Serialize + DeserializeOwned` so components can be saved
//! into templates, and `Clone` so one entity can be cloned from another.
//!
//! ## Type Identity
//!
//! [`ComponentTypeId`] is a dense `u32` assigned lazily the first time a
//! component type is used and cached process-wide. The same type always
//! yields the same id for the lifetime of the process; distinct types never
//! share one. Alongside the id the registry records the component's
//! [`Component::type_name`] and a decoder, which is what lets untyped layers
//! (scripting, template loading) address components by name.

use std::any::Any;
use std::fmt;
use std::sync::LazyLock;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::ComponentError;
use crate::type_index::TypeIndex;

/// A unique identifier for a component type.
///
/// Assigned on first use; see the module documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u32);

impl ComponentTypeId {
    /// Returns the id for component type `T`, registering it on first use.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        REGISTRY.register::<T>()
    }

    /// Returns the id for `T` only if it has already been assigned. Unlike
    /// [`of`](Self::of) this never registers the type.
    #[must_use]
    pub fn registered<T: Component>() -> Option<Self> {
        REGISTRY.index.get::<T>().map(Self)
    }

    /// Look up the id of a registered component by its
    /// [`Component::type_name`].
    ///
    /// Returns `None` if no component with that name has been used or
    /// registered yet.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        REGISTRY.by_name.get(name).map(|entry| *entry)
    }

    /// Returns the registered name of this component type.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        REGISTRY.info.get(&self).map(|info| info.name)
    }

    /// Returns the raw `u32` identifier.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}#{}", self.0),
            None => write!(f, "Component#{}", self.0),
        }
    }
}

/// The core component trait.
///
/// # Examples
///
/// ```rust
/// use serde::{Serialize, Deserialize};
/// use engine_component::Component;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component:
    fmt::Debug + Clone + Send + Sync + 'static + Serialize + DeserializeOwned
{
    /// A human-readable name for this component type. Used for by-name
    /// lookups, so it should be unique across the process.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::of::<Self>()
    }
}

/// Object-safe view of a [`Component`], used wherever components are stored
/// without their static type.
///
/// Implemented for every `T: Component`; there is no reason to implement it
/// by hand.
pub trait AnyComponent: fmt::Debug + Send + Sync + 'static {
    /// The id of the concrete component type.
    fn component_id(&self) -> ComponentTypeId;

    /// The [`Component::type_name`] of the concrete component type.
    fn component_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Deep-copy this component into a new box.
    fn clone_boxed(&self) -> Box<dyn AnyComponent>;

    /// Serialise this component to MessagePack bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the component's `Serialize` impl fails.
    fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error>;
}

impl<T: Component> AnyComponent for T {
    fn component_id(&self) -> ComponentTypeId {
        <T as Component>::component_type_id()
    }

    fn component_name(&self) -> &'static str {
        <T as Component>::type_name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn AnyComponent> {
        Box::new(self.clone())
    }

    fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }
}

impl dyn AnyComponent {
    /// Returns `true` if the boxed component is a `T`.
    #[must_use]
    pub fn is<T: Component>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcast to a concrete component type.
    #[must_use]
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcast to a concrete component type, mutably.
    #[must_use]
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Register `T` with the process-wide registry without otherwise using it.
///
/// Registration happens implicitly the first time a component type is used.
/// Call this during startup for components that will only ever be reached
/// by name (e.g. spawned from templates or looked up from scripts).
pub fn register_component<T: Component>() -> ComponentTypeId {
    ComponentTypeId::of::<T>()
}

/// Decode a component from MessagePack bytes, using the decoder registered
/// under `name`.
///
/// # Errors
///
/// Returns [`ComponentError::UnknownComponent`] if no component is registered
/// under `name`, or [`ComponentError::Decode`] if the bytes are invalid.
pub fn decode_named(name: &str, bytes: &[u8]) -> Result<Box<dyn AnyComponent>, ComponentError> {
    let id = ComponentTypeId::from_name(name)
        .ok_or_else(|| ComponentError::UnknownComponent(name.to_string()))?;
    let decode = REGISTRY
        .info
        .get(&id)
        .map(|info| info.decode)
        .ok_or_else(|| ComponentError::UnknownComponent(name.to_string()))?;
    Ok(decode(bytes)?)
}

/// Returns the number of component types registered in this process.
#[must_use]
pub fn registered_component_count() -> usize {
    REGISTRY.index.len()
}

type DecodeFn = fn(&[u8]) -> Result<Box<dyn AnyComponent>, rmp_serde::decode::Error>;

#[derive(Clone, Copy)]
struct ComponentInfo {
    name: &'static str,
    decode: DecodeFn,
}

fn decode_boxed<T: Component>(bytes: &[u8]) -> Result<Box<dyn AnyComponent>, rmp_serde::decode::Error> {
    let value: T = rmp_serde::from_slice(bytes)?;
    Ok(Box::new(value))
}

struct ComponentRegistry {
    index: TypeIndex,
    info: DashMap<ComponentTypeId, ComponentInfo>,
    by_name: DashMap<&'static str, ComponentTypeId>,
}

static REGISTRY: LazyLock<ComponentRegistry> = LazyLock::new(|| ComponentRegistry {
    index: TypeIndex::new(),
    info: DashMap::new(),
    by_name: DashMap::new(),
});

impl ComponentRegistry {
    fn register<T: Component>(&self) -> ComponentTypeId {
        let (raw, fresh) = self.index.assign::<T>();
        let id = ComponentTypeId(raw);
        if fresh {
            let name = <T as Component>::type_name();
            self.info.insert(
                id,
                ComponentInfo {
                    name,
                    decode: decode_boxed::<T>,
                },
            );
            match self.by_name.entry(name) {
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
                Entry::Occupied(existing) => {
                    warn!(
                        name,
                        existing = existing.get().raw(),
                        ignored = raw,
                        "component name already registered to another type"
                    );
                }
            }
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Health {
        current: f32,
        max: f32,
    }

    impl Component for Health {
        fn type_name() -> &'static str {
            "component::tests::Health"
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Velocity {
        x: f32,
        y: f32,
    }

    impl Component for Velocity {
        fn type_name() -> &'static str {
            "component::tests::Velocity"
        }
    }

    #[test]
    fn test_component_type_id_is_stable() {
        let id1 = Health::component_type_id();
        let id2 = Health::component_type_id();
        assert_eq!(id1, id2);
        assert_eq!(id1, ComponentTypeId::of::<Health>());
    }

    #[test]
    fn test_component_type_id_differs_between_types() {
        assert_ne!(Health::component_type_id(), Velocity::component_type_id());
    }

    #[test]
    fn test_lookup_by_name() {
        let id = register_component::<Health>();
        assert_eq!(
            ComponentTypeId::from_name("component::tests::Health"),
            Some(id)
        );
        assert_eq!(id.name(), Some("component::tests::Health"));
        assert_eq!(ComponentTypeId::from_name("component::tests::Missing"), None);
    }

    #[test]
    fn test_duplicate_name_keeps_first_registration() {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        struct Impostor;
        impl Component for Impostor {
            fn type_name() -> &'static str {
                "component::tests::Velocity"
            }
        }

        let original = register_component::<Velocity>();
        let impostor = register_component::<Impostor>();
        assert_ne!(original, impostor);
        assert_eq!(
            ComponentTypeId::from_name("component::tests::Velocity"),
            Some(original)
        );
    }

    #[test]
    fn test_erased_downcast() {
        let boxed: Box<dyn AnyComponent> = Box::new(Health {
            current: 5.0,
            max: 10.0,
        });
        assert!(boxed.is::<Health>());
        assert!(!boxed.is::<Velocity>());
        assert_eq!(boxed.downcast_ref::<Health>().map(|h| h.max), Some(10.0));
        assert!(boxed.downcast_ref::<Velocity>().is_none());
        assert_eq!(boxed.component_id(), Health::component_type_id());
        assert_eq!(boxed.component_name(), "component::tests::Health");
    }

    #[test]
    fn test_clone_boxed_is_deep() {
        let mut original: Box<dyn AnyComponent> = Box::new(Health {
            current: 1.0,
            max: 2.0,
        });
        let copy = original.clone_boxed();
        if let Some(health) = original.downcast_mut::<Health>() {
            health.current = 99.0;
        }
        assert_eq!(copy.downcast_ref::<Health>().map(|h| h.current), Some(1.0));
    }

    #[test]
    fn test_decode_named() {
        register_component::<Health>();
        let bytes = Health {
            current: 3.0,
            max: 4.0,
        }
        .encode()
        .unwrap();
        let decoded = decode_named("component::tests::Health", &bytes).unwrap();
        assert_eq!(
            decoded.downcast_ref::<Health>(),
            Some(&Health {
                current: 3.0,
                max: 4.0
            })
        );
    }

    #[test]
    fn test_decode_named_unknown() {
        let result = decode_named("component::tests::Nope", &[]);
        assert!(matches!(result, Err(ComponentError::UnknownComponent(_))));
    }
}
