//! Entity templates, the hand-off format for saving an entity's component
//! set and spawning copies of it later.
//!
//! A [`Template`] is a name plus one [`ComponentRecord`] per component, each
//! holding the component's registered name and its MessagePack bytes. Where
//! templates are persisted is up to the [`TemplateSink`] implementation; the
//! in-memory [`TemplateLibrary`] is the default one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec;
use crate::component::{AnyComponent, decode_named};
use crate::error::ComponentError;
use crate::storage::ComponentStorage;

/// A single serialised component, addressed by its registered name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// The component's [`Component::type_name`](crate::Component::type_name).
    pub type_name: String,
    /// MessagePack-encoded component bytes.
    pub data: Vec<u8>,
}

impl ComponentRecord {
    /// Encode a component into a record, registering its type by name so
    /// the record can be decoded later.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Encode`] if serialisation fails.
    pub fn from_component(component: &dyn AnyComponent) -> Result<Self, ComponentError> {
        component.component_id();
        Ok(Self {
            type_name: component.component_name().to_string(),
            data: component.encode()?,
        })
    }

    /// Decode this record back into a component.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::UnknownComponent`] if the name is not
    /// registered, or [`ComponentError::Decode`] if the bytes are invalid.
    pub fn decode(&self) -> Result<Box<dyn AnyComponent>, ComponentError> {
        decode_named(&self.type_name, &self.data)
    }
}

/// A named, reusable snapshot of an entity's components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub components: Vec<ComponentRecord>,
}

impl Template {
    /// Create an empty template.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
        }
    }

    /// Snapshot every component in `storage`.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Encode`] if any component fails to encode.
    pub fn from_storage(
        name: impl Into<String>,
        storage: &ComponentStorage,
    ) -> Result<Self, ComponentError> {
        let components = storage
            .iter()
            .map(|(_, component)| ComponentRecord::from_component(component))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.into(),
            components,
        })
    }

    /// Append a component to the template.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Encode`] if the component fails to encode.
    pub fn push(&mut self, component: &dyn AnyComponent) -> Result<(), ComponentError> {
        self.components.push(ComponentRecord::from_component(component)?);
        Ok(())
    }

    /// Decode every record into a fresh component instance.
    ///
    /// # Errors
    ///
    /// Fails on the first record that cannot be resolved or decoded.
    pub fn instantiate(&self) -> Result<Vec<Box<dyn AnyComponent>>, ComponentError> {
        self.components.iter().map(ComponentRecord::decode).collect()
    }

    /// Registered names of the components in this template.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|record| record.type_name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Encode the whole template to MessagePack.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Encode`] if serialisation fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ComponentError> {
        codec::encode(self)
    }

    /// Decode a template previously produced by [`Template::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Decode`] if the bytes are invalid.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ComponentError> {
        codec::decode(bytes)
    }
}

/// Receives templates saved from entities. Implemented by whatever owns the
/// persisted representation.
pub trait TemplateSink {
    /// Store `template`, replacing any template with the same name.
    ///
    /// # Errors
    ///
    /// Implementations return an error if the template cannot be stored.
    fn store_template(&mut self, template: Template) -> Result<(), ComponentError>;
}

/// In-memory template store keyed by template name.
#[derive(Debug, Default)]
pub struct TemplateLibrary {
    templates: HashMap<String, Template>,
}

impl TemplateLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Like [`get`](Self::get), but absence is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::TemplateNotFound`] if no template has this
    /// name.
    pub fn require(&self, name: &str) -> Result<&Template, ComponentError> {
        self.get(name)
            .ok_or_else(|| ComponentError::TemplateNotFound(name.to_string()))
    }

    pub fn remove(&mut self, name: &str) -> Option<Template> {
        self.templates.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateSink for TemplateLibrary {
    fn store_template(&mut self, template: Template) -> Result<(), ComponentError> {
        debug!(
            template = %template.name,
            components = template.len(),
            "storing template"
        );
        self.templates.insert(template.name.clone(), template);
        Ok(())
    }
}
