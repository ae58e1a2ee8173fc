//! Scene-level error types.

use engine_component::EntityId;

/// Errors raised by [`Scene`](crate::Scene) operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// An entity with this id is already live in the scene.
    #[error("{0} is already in the scene")]
    DuplicateEntity(EntityId),

    /// The id was never handed out by the scene's allocator, which would
    /// issue it again later.
    #[error("{0} was not issued by this scene's allocator")]
    UnissuedEntity(EntityId),
}
