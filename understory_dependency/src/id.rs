// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Identification types.
//!
//! This module provides [`PropertyId`] for property identities, [`PropertyKey`]
//! for the capability that unlocks writes to read-only properties, and
//! [`ClassId`] for owner and value classes.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

/// Source of property handles, shared by every registry in the process.
static NEXT_PROPERTY: AtomicU32 = AtomicU32::new(1);

/// A property identity.
///
/// This is a lightweight handle allocated by [`PropertyRegistry`](crate::PropertyRegistry)
/// at registration. Handles are unique across the whole process, even across
/// independent registries, and equality and hashing are by handle only.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyId(u32);

impl PropertyId {
    /// Allocates the next handle.
    pub(crate) fn allocate() -> Self {
        Self(NEXT_PROPERTY.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying handle.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyId").field(&self.0).finish()
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId({})", self.0)
    }
}

/// Write capability for a read-only property.
///
/// Returned by the read-only registration functions. The public
/// [`PropertyId`] is available from [`PropertyKey::property`] and can be
/// handed out freely; mutation through
/// [`DependencyObject::set_value_with_key`](crate::DependencyObject::set_value_with_key)
/// requires the key itself. A key cannot be constructed outside this crate.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PropertyKey {
    property: PropertyId,
}

impl PropertyKey {
    pub(crate) const fn new(property: PropertyId) -> Self {
        Self { property }
    }

    /// Returns the public identity of the property this key unlocks.
    #[must_use]
    #[inline]
    pub const fn property(&self) -> PropertyId {
        self.property
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyKey")
            .field("property", &self.property)
            .finish()
    }
}

/// A class in the owner/value type hierarchy.
///
/// Classes are registered with a [`PropertyRegistry`](crate::PropertyRegistry)
/// and form single-inheritance chains. Two classes are built in.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(u32);

impl ClassId {
    /// The value-holder base class. Every [`DependencyObject`](crate::DependencyObject)
    /// is an instance of a class deriving from it.
    pub const DEPENDENCY_OBJECT: Self = Self(0);

    /// The freezable base class, deriving from [`ClassId::DEPENDENCY_OBJECT`].
    pub const FREEZABLE: Self = Self(1);

    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the index of this class within its registry.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClassId").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_ids_are_distinct() {
        let a = PropertyId::allocate();
        let b = PropertyId::allocate();
        assert_ne!(a, b);
        assert!(b.index() > a.index());
    }

    #[test]
    fn property_id_debug_and_display() {
        let id = PropertyId(42);
        assert_eq!(format!("{id:?}"), "PropertyId(42)");
        assert_eq!(format!("{id}"), "PropertyId(42)");
    }

    #[test]
    fn key_exposes_public_identity() {
        let id = PropertyId::allocate();
        let key = PropertyKey::new(id);
        assert_eq!(key.property(), id);
        assert_eq!(key.clone(), key);
    }

    #[test]
    fn builtin_classes() {
        assert_ne!(ClassId::DEPENDENCY_OBJECT, ClassId::FREEZABLE);
        assert_eq!(ClassId::FREEZABLE.index(), 1);
    }
}
