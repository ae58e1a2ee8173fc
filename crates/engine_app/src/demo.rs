//! Demo content for the `engine_app` binary: a handful of components and
//! systems that exercise the scene end to end.
//!
//! Entities drift under [`Movement`], age under [`Expiry`] (which kills them
//! through the deferred command queue once their lifetime runs out), and are
//! tracked by name by [`Census`].

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use engine_component::{Component, ComponentError, Entity, TemplateLibrary, register_component};
use engine_system::{BaseSystem, RequirementGroup, System, SystemContext, SystemError};

use crate::scene::Scene;

/// Position, rotation and scale in 3D space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn translated(mut self, offset: Vec3) -> Self {
        self.position += offset;
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Component for Transform {
    fn type_name() -> &'static str {
        "Transform"
    }
}

/// Linear velocity in units per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Velocity(pub Vec3);

impl Component for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }
}

/// Seconds left before the entity expires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lifetime {
    pub remaining: f32,
}

impl Component for Lifetime {
    fn type_name() -> &'static str {
        "Lifetime"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Name(pub String);

impl Component for Name {
    fn type_name() -> &'static str {
        "Name"
    }
}

/// Make the demo components resolvable by name (templates, scripting).
pub fn register_components() {
    register_component::<Transform>();
    register_component::<Velocity>();
    register_component::<Lifetime>();
    register_component::<Name>();
}

/// Integrates [`Velocity`] into [`Transform`].
#[derive(Debug, Default)]
pub struct Movement;

impl System for Movement {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn process_entity(&mut self, entity: &mut Entity, ctx: &SystemContext) {
        let Some(&Velocity(velocity)) = entity.get_component::<Velocity>() else {
            return;
        };
        if let Some(transform) = entity.get_component_mut::<Transform>() {
            *transform = transform.translated(velocity * ctx.dt as f32);
        }
    }
}

/// Counts down [`Lifetime`] and kills the entity when it reaches zero.
#[derive(Debug, Default)]
pub struct Expiry {
    pub expired: usize,
}

impl System for Expiry {
    fn name(&self) -> &'static str {
        "expiry"
    }

    fn on_kill(&mut self, entity: &mut Entity) {
        debug!(entity = %entity.id(), "expired");
        self.expired += 1;
    }

    fn process_entity(&mut self, entity: &mut Entity, ctx: &SystemContext) {
        let Some(lifetime) = entity.get_component_mut::<Lifetime>() else {
            return;
        };
        lifetime.remaining -= ctx.dt as f32;
        if lifetime.remaining <= 0.0 {
            ctx.commands.kill(entity.id());
        }
    }
}

/// Keeps a head count of named entities.
#[derive(Debug, Default)]
pub struct Census {
    pub present: usize,
    pub seen: usize,
}

impl System for Census {
    fn name(&self) -> &'static str {
        "census"
    }

    fn on_attach(&mut self, _entity: &mut Entity) {
        self.present += 1;
        self.seen += 1;
    }

    fn on_detach(&mut self, _entity: &mut Entity) {
        self.present = self.present.saturating_sub(1);
    }

    fn on_clear(&mut self) {
        self.present = 0;
    }

    fn process_entity(&mut self, _entity: &mut Entity, _ctx: &SystemContext) {}
}

/// Register the demo systems on `scene`.
///
/// # Errors
///
/// Fails if any of them is already registered.
pub fn install_systems(scene: &mut Scene) -> Result<(), SystemError> {
    scene.add_system(
        BaseSystem::new(Movement)
            .with_requirement(RequirementGroup::new().with::<Transform>().with::<Velocity>()),
    )?;
    scene.add_system(
        BaseSystem::new(Expiry::default())
            .with_requirement(RequirementGroup::new().with::<Lifetime>()),
    )?;
    scene.add_system(
        BaseSystem::new(Census::default()).with_requirement(RequirementGroup::new().with::<Name>()),
    )?;
    Ok(())
}

/// Build a "drifter" prototype, save it as a template and spawn `count`
/// copies of it with staggered lifetimes and velocities.
///
/// # Errors
///
/// Fails if the template cannot be encoded or decoded.
pub fn populate(scene: &mut Scene, count: usize) -> Result<TemplateLibrary, ComponentError> {
    let mut library = TemplateLibrary::new();

    let mut prototype = Entity::new(scene.commands().allocator().allocate());
    prototype.add_component(Transform::default());
    prototype.add_component(Velocity(Vec3::X));
    prototype.add_component(Lifetime { remaining: 1.0 });
    prototype.save("drifter", &mut library)?;

    let template = library.require("drifter")?;
    for n in 0..count {
        let id = scene.spawn_from_template(template)?;
        if let Some(entity) = scene.entity_mut(id) {
            let step = n as f32;
            entity.add_component(Velocity(Vec3::new(1.0, step, 0.0)));
            entity.add_component(Lifetime {
                remaining: 0.5 + step * 0.25,
            });
            entity.add_component(Name(format!("drifter-{n}")));
        }
    }

    info!(count, templates = library.len(), "scene populated");
    Ok(library)
}
