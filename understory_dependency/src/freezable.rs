// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Freezable objects.
//!
//! A [`Freezable`] is a [`DependencyObject`] that can be made permanently
//! immutable. A frozen object drops its thread affinity and its subscribers,
//! and may then be shared and read from any thread.
//!
//! Freezing is deep: every unfrozen freezable held in a non-read-only
//! property is frozen with it, and the whole graph either freezes or stays as
//! it was. Cloning is deep in the same way, with frozen sub-objects shared
//! rather than copied.
//!
//! Per-class behavior (the factory used by cloning, extra freeze conditions)
//! lives in a [`FreezableCore`] registered with
//! [`PropertyRegistry::register_freezable_class`].

use core::fmt;
use core::ops::Deref;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{PropertyError, Result};
use crate::event::{ChangeKind, ChangedHandler};
use crate::id::{ClassId, PropertyId};
use crate::object::DependencyObject;
use crate::registry::PropertyRegistry;
use crate::store::EffectiveValueEntry;
use crate::types::ValueType;
use crate::value::Value;

/// Per-class hooks for freezable behavior.
///
/// Both methods have defaults; [`DefaultFreezableCore`] uses them unchanged.
pub trait FreezableCore: Send + Sync + 'static {
    /// Creates the empty instance that a clone is copied into.
    ///
    /// Returning `Ok(None)` fails the clone with
    /// [`PropertyError::InvalidArgument`]. The instance must be a fresh,
    /// unfrozen object; returning `source` itself is only accepted by the
    /// `get_as_frozen` family, which then freezes `source` in place.
    fn create_instance(&self, source: &Freezable) -> Result<Option<Freezable>> {
        Freezable::new(source.registry(), source.class()).map(Some)
    }

    /// Returns whether `target` can be frozen right now.
    ///
    /// Overrides normally combine an extra condition with
    /// [`Freezable::can_freeze_properties`].
    fn can_freeze_core(&self, target: &Freezable) -> Result<bool> {
        target.can_freeze_properties()
    }
}

/// The stock [`FreezableCore`].
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultFreezableCore;

impl FreezableCore for DefaultFreezableCore {}

/// Which stored value a clone copies.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CloneMode {
    /// Authored values.
    Base,
    /// Effective values, including coercion.
    Current,
}

/// A [`DependencyObject`] that can be frozen.
///
/// Derefs to [`DependencyObject`] for property access.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use understory_dependency::{ClassId, Freezable, PropertyRegistry, Value, ValueType};
///
/// let registry = Arc::new(PropertyRegistry::new());
/// let brush = registry.register_class("Brush", Some(ClassId::FREEZABLE)).unwrap();
/// let opacity = registry.register("Opacity", ValueType::FLOAT64, brush, None, None).unwrap();
///
/// let solid = Freezable::new(&registry, brush).unwrap();
/// solid.set_value(opacity, 0.5).unwrap();
/// solid.freeze().unwrap();
///
/// assert!(solid.is_frozen());
/// assert!(solid.set_value(opacity, 1.0).is_err());
///
/// let copy = solid.clone_freezable().unwrap();
/// assert!(!copy.is_frozen());
/// assert_eq!(copy.get_value(opacity).unwrap(), Value::Float64(0.5));
/// ```
#[derive(Clone)]
pub struct Freezable {
    object: DependencyObject,
}

impl Freezable {
    /// Creates an instance of a freezable class, owned by the calling thread.
    ///
    /// # Errors
    ///
    /// [`PropertyError::TypeMismatch`] if `class` does not derive from
    /// [`ClassId::FREEZABLE`].
    pub fn new(registry: &Arc<PropertyRegistry>, class: ClassId) -> Result<Self> {
        let Some(core) = registry.freezable_core(class) else {
            return Err(PropertyError::type_mismatch(
                "Freezable",
                registry.type_name(ValueType::Class(class)),
            ));
        };
        Ok(Self::from_object(DependencyObject::create(
            registry,
            class,
            Some(core),
        )))
    }

    pub(crate) fn from_object(object: DependencyObject) -> Self {
        debug_assert!(object.is_freezable(), "object has no freezable core");
        Self { object }
    }

    /// Returns the underlying object handle.
    #[must_use]
    #[inline]
    pub fn as_object(&self) -> &DependencyObject {
        &self.object
    }

    /// Converts into the underlying object handle.
    #[must_use]
    #[inline]
    pub fn into_object(self) -> DependencyObject {
        self.object
    }

    fn core(&self) -> Result<&Arc<dyn FreezableCore>> {
        self.object
            .core()
            .ok_or(PropertyError::InvalidOperation("object has no freezable core"))
    }

    /// Values a freeze or clone traverses: non-read-only entries in handle order.
    fn traversed_entries(&self) -> Result<Vec<(PropertyId, EffectiveValueEntry)>> {
        let registry = self.registry();
        let mut entries = self.object.entries()?;
        entries.retain(|(id, _)| registry.property(*id).is_none_or(|r| !r.is_read_only()));
        Ok(entries)
    }

    // =========================================================================
    // Freezing
    // =========================================================================

    /// Returns whether [`Freezable::freeze`] would succeed.
    ///
    /// Always `true` once frozen.
    pub fn can_freeze(&self) -> Result<bool> {
        if self.is_frozen() {
            return Ok(true);
        }
        self.verify_access()?;
        self.core()?.can_freeze_core(self)
    }

    /// The default freeze rule: every value held in a non-read-only property
    /// is either a non-object, a frozen freezable, or an unfrozen freezable
    /// that can itself freeze.
    ///
    /// Plain [`DependencyObject`] values are thread-bound forever, so they
    /// block freezing.
    pub fn can_freeze_properties(&self) -> Result<bool> {
        for (_, entry) in self.traversed_entries()? {
            for value in entry.values() {
                let Value::Object(object) = value else {
                    continue;
                };
                match object.as_freezable() {
                    Some(nested) if nested.can_freeze()? => {}
                    _ => return Ok(false),
                }
            }
        }
        Ok(true)
    }

    /// Freezes this object and every freezable it holds.
    ///
    /// Freezing a frozen object is a no-op. On success the subscribers that
    /// were attached are notified once with [`ChangeKind::Frozen`] and then
    /// released.
    ///
    /// # Errors
    ///
    /// - [`PropertyError::ThreadAffinity`] from a non-owner thread.
    /// - [`PropertyError::InvalidOperation`] if any part of the graph cannot
    ///   freeze; nothing is frozen in that case.
    pub fn freeze(&self) -> Result<()> {
        if self.is_frozen() {
            return Ok(());
        }
        if !self.can_freeze()? {
            log::debug!("freeze refused for {:?}", self.class());
            return Err(PropertyError::InvalidOperation("object graph cannot be frozen"));
        }
        let handlers = self.commit_freeze()?;
        log::debug!("froze {:?}", self.class());
        self.object.dispatch(&handlers, ChangeKind::Frozen);
        Ok(())
    }

    /// Freezes nested freezables first, then this object.
    ///
    /// Only called once `can_freeze` has accepted the graph. Nested
    /// subscribers are released without notification.
    fn commit_freeze(&self) -> Result<SmallVec<[ChangedHandler; 2]>> {
        if self.is_frozen() {
            return Ok(SmallVec::new());
        }
        for (_, entry) in self.traversed_entries()? {
            for nested in entry.values().filter_map(Value::as_freezable) {
                nested.commit_freeze()?;
            }
        }
        Ok(self.object.mark_frozen())
    }

    // =========================================================================
    // Cloning
    // =========================================================================

    /// Creates a mutable deep copy of the authored values.
    ///
    /// Read-only properties are not copied. Unfrozen nested freezables are
    /// cloned recursively, frozen ones are shared, and other values are
    /// copied by reference. The copy is owned by the calling thread, even
    /// when `self` is frozen.
    pub fn clone_freezable(&self) -> Result<Self> {
        self.clone_with(CloneMode::Base)
    }

    /// Like [`Freezable::clone_freezable`], but copies effective (coerced)
    /// values.
    pub fn clone_current_value(&self) -> Result<Self> {
        self.clone_with(CloneMode::Current)
    }

    /// Returns a frozen copy of the authored values, or `self` if already
    /// frozen.
    ///
    /// # Errors
    ///
    /// [`PropertyError::InvalidOperation`] if the copy cannot be frozen; the
    /// partial copy is discarded.
    pub fn get_as_frozen(&self) -> Result<Self> {
        self.frozen_with(CloneMode::Base)
    }

    /// Like [`Freezable::get_as_frozen`], but copies effective values.
    pub fn get_current_value_as_frozen(&self) -> Result<Self> {
        self.frozen_with(CloneMode::Current)
    }

    fn clone_with(&self, mode: CloneMode) -> Result<Self> {
        let entries = self.traversed_entries()?;
        let instance = self.create_instance()?;
        if instance.object.ptr_eq(&self.object) {
            return Err(PropertyError::InvalidOperation(
                "factory returned the source instance",
            ));
        }
        self.copy_into(&instance, entries, mode, false)?;
        log::debug!("cloned {:?} ({mode:?})", self.class());
        Ok(instance)
    }

    fn frozen_with(&self, mode: CloneMode) -> Result<Self> {
        if self.is_frozen() {
            return Ok(self.clone());
        }
        let entries = self.traversed_entries()?;
        let instance = self.create_instance()?;
        if instance.object.ptr_eq(&self.object) {
            self.freeze()?;
            return Ok(instance);
        }
        self.copy_into(&instance, entries, mode, true)?;
        instance.freeze()?;
        Ok(instance)
    }

    fn create_instance(&self) -> Result<Self> {
        let Some(instance) = self.core()?.create_instance(self)? else {
            return Err(PropertyError::InvalidArgument(
                "factory did not produce an instance".into(),
            ));
        };
        if instance.is_frozen() && !instance.object.ptr_eq(&self.object) {
            return Err(PropertyError::InvalidOperation(
                "factory returned a frozen instance",
            ));
        }
        Ok(instance)
    }

    /// Copies `entries` into `target`. Mutable nested freezables are cloned,
    /// or copied as frozen when `frozen` is set.
    fn copy_into(
        &self,
        target: &Self,
        entries: Vec<(PropertyId, EffectiveValueEntry)>,
        mode: CloneMode,
        frozen: bool,
    ) -> Result<()> {
        for (id, entry) in entries {
            let value = match mode {
                CloneMode::Base => entry.local(),
                CloneMode::Current => entry.effective(),
            };
            if value.is_unset() {
                continue;
            }
            let value = match value.as_freezable() {
                Some(nested) if !nested.is_frozen() => Value::from(if frozen {
                    nested.frozen_with(mode)?
                } else {
                    nested.clone_with(mode)?
                }),
                _ => value.clone(),
            };
            target.set_value(id, value)?;
        }
        Ok(())
    }
}

impl Deref for Freezable {
    type Target = DependencyObject;

    fn deref(&self) -> &DependencyObject {
        &self.object
    }
}

impl AsRef<DependencyObject> for Freezable {
    fn as_ref(&self) -> &DependencyObject {
        &self.object
    }
}

impl fmt::Debug for Freezable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Freezable").field(&self.object).finish()
    }
}
