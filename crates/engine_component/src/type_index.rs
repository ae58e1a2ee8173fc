//! Lazily assigned, process-wide integer identifiers for Rust types.
//!
//! A [`TypeIndex`] hands out dense `u32` indices the first time a type is
//! seen and returns the same index for that type for the rest of the
//! process. Indices start at 0 and are never reused, so two distinct types
//! can never collide.

use std::any::TypeId;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

/// A concurrent map from [`TypeId`] to a dense, monotonically assigned index.
#[derive(Debug, Default)]
pub struct TypeIndex {
    indices: DashMap<TypeId, u32>,
    next: AtomicU32,
}

impl TypeIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            indices: DashMap::new(),
            next: AtomicU32::new(0),
        }
    }

    /// Returns the index for `T`, assigning one on first use.
    ///
    /// The boolean is `true` only for the call that performed the assignment.
    pub fn assign<T: ?Sized + 'static>(&self) -> (u32, bool) {
        let key = TypeId::of::<T>();
        if let Some(index) = self.indices.get(&key).map(|entry| *entry) {
            return (index, false);
        }

        let mut fresh = false;
        let index = *self.indices.entry(key).or_insert_with(|| {
            fresh = true;
            self.next.fetch_add(1, Ordering::Relaxed)
        });
        (index, fresh)
    }

    /// Returns the index for `T` if one has been assigned.
    #[must_use]
    pub fn get<T: ?Sized + 'static>(&self) -> Option<u32> {
        self.indices.get(&TypeId::of::<T>()).map(|entry| *entry)
    }

    /// Returns how many types have been assigned an index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` if no type has been assigned an index yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
