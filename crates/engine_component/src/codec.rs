//! MessagePack codec helpers.
//!
//! Thin wrappers around `rmp-serde`. Templates and component records use
//! the named (map) encoding so field order changes do not break saved data.

use serde::{Deserialize, Serialize};

use crate::error::ComponentError;

/// Encode a value to MessagePack bytes.
///
/// # Errors
///
/// Returns [`ComponentError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ComponentError> {
    rmp_serde::to_vec_named(value).map_err(ComponentError::Encode)
}

/// Decode a value from MessagePack bytes.
///
/// # Errors
///
/// Returns [`ComponentError::Decode`] if deserialisation fails.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, ComponentError> {
    rmp_serde::from_slice(bytes).map_err(ComponentError::Decode)
}
