//! System-layer error types.

/// Errors raised while registering systems with a scene.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// A system of the same concrete type is already registered.
    #[error("system '{name}' is already registered")]
    Duplicate { name: &'static str },
}
