//! Component-layer error types.

/// Errors raised while encoding, decoding or resolving components by name.
///
/// Absence of a component on an entity is never an error; queries return
/// `Option` instead.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// Failed to encode a component or template to MessagePack.
    #[error("failed to encode: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a component or template from MessagePack.
    #[error("failed to decode: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// No component type is registered under this name.
    #[error("unknown component '{0}'")]
    UnknownComponent(String),

    /// A template store has no template with this name.
    #[error("template '{0}' not found")]
    TemplateNotFound(String),
}
