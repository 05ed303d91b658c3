// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property and class registry.
//!
//! This module provides [`PropertyRegistry`] for registering classes and
//! properties, attaching per-owner-type metadata, and resolving the metadata
//! that applies to a concrete class.

use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hashbrown::HashMap;

use crate::affinity::{CurrentThread, ThreadContext};
use crate::error::{PropertyError, Result};
use crate::freezable::{DefaultFreezableCore, FreezableCore};
use crate::id::{ClassId, PropertyId, PropertyKey};
use crate::metadata::{PropertyMetadata, ValidateValueCallback};
use crate::types::{Scalar, ValueType};
use crate::value::Value;

/// A registration entry for a property.
///
/// This stores the identity's name, declared type, owner, and the validate
/// callback. Metadata is stored separately per owner type.
pub struct PropertyRegistration {
    id: PropertyId,
    name: Arc<str>,
    value_type: ValueType,
    owner: ClassId,
    read_only: bool,
    attached: bool,
    validate: Option<ValidateValueCallback>,
}

impl PropertyRegistration {
    /// Returns the property identity.
    #[must_use]
    #[inline]
    pub fn id(&self) -> PropertyId {
        self.id
    }

    /// Returns the property name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared value type.
    #[must_use]
    #[inline]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Returns the class the property was registered on.
    #[must_use]
    #[inline]
    pub fn owner(&self) -> ClassId {
        self.owner
    }

    /// Returns whether writes require a [`PropertyKey`].
    #[must_use]
    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns whether the property was registered as attached.
    #[must_use]
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Runs the validate callback, accepting everything when there is none.
    #[must_use]
    pub fn is_valid_value(&self, value: &Value) -> bool {
        self.validate.as_ref().is_none_or(|validate| validate(value))
    }

    pub(crate) fn validation_error(&self, value: &Value) -> PropertyError {
        PropertyError::Validation {
            property: self.name.to_string(),
            value: format!("{value:?}"),
        }
    }
}

impl core::fmt::Debug for PropertyRegistration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PropertyRegistration")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("owner", &self.owner)
            .field("read_only", &self.read_only)
            .field("attached", &self.attached)
            .finish_non_exhaustive()
    }
}

struct ClassEntry {
    name: Arc<str>,
    base: Option<ClassId>,
    /// Present exactly for classes deriving from [`ClassId::FREEZABLE`].
    core: Option<Arc<dyn FreezableCore>>,
}

#[derive(Default)]
struct RegistryInner {
    classes: Vec<ClassEntry>,
    class_names: HashMap<Arc<str>, ClassId>,
    properties: HashMap<PropertyId, Arc<PropertyRegistration>>,
    by_name: HashMap<ClassId, HashMap<Arc<str>, PropertyId>>,
    /// Metadata attached per (property, class); the owner's record is the base.
    metadata: HashMap<(PropertyId, ClassId), Arc<PropertyMetadata>>,
    /// Resolved metadata per (property, concrete class).
    resolved: HashMap<(PropertyId, ClassId), Arc<PropertyMetadata>>,
}

impl RegistryInner {
    fn class(&self, class: ClassId) -> Option<&ClassEntry> {
        self.classes.get(class.index() as usize)
    }

    fn class_name(&self, class: ClassId) -> String {
        self.class(class)
            .map_or_else(|| format!("{class:?}"), |entry| entry.name.to_string())
    }

    fn is_subclass_of(&self, class: ClassId, base: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(c) = current {
            if c == base {
                return true;
            }
            current = self.class(c).and_then(|entry| entry.base);
        }
        false
    }

    fn add_class(
        &mut self,
        name: &str,
        base: Option<ClassId>,
        core: Option<Arc<dyn FreezableCore>>,
    ) -> Result<ClassId> {
        if self.class_names.contains_key(name) {
            return Err(PropertyError::DuplicateRegistration {
                name: name.into(),
                owner: "class table".into(),
            });
        }
        if let Some(base) = base
            && self.class(base).is_none()
        {
            return Err(PropertyError::InvalidArgument(format!(
                "unknown base class {base:?}"
            )));
        }
        let core = core.or_else(|| base.and_then(|b| self.class(b)?.core.clone()));
        #[expect(clippy::cast_possible_truncation, reason = "class tables stay far below u32::MAX")]
        let id = ClassId::new(self.classes.len() as u32);
        let name: Arc<str> = Arc::from(name);
        self.classes.push(ClassEntry {
            name: name.clone(),
            base,
            core,
        });
        self.class_names.insert(name, id);
        Ok(id)
    }

    fn find(&self, name: &str, owner: ClassId) -> Option<PropertyId> {
        self.by_name.get(&owner)?.get(name).copied()
    }

    fn registration(&self, id: PropertyId) -> Result<&Arc<PropertyRegistration>> {
        self.properties
            .get(&id)
            .ok_or_else(|| PropertyError::InvalidArgument(format!("unknown property {id}")))
    }

    /// Walks from `class` towards the root, returning the most derived
    /// attached record, or the owner's record.
    fn resolve(&self, id: PropertyId, class: Option<ClassId>) -> Result<Arc<PropertyMetadata>> {
        let registration = self.registration(id)?;
        let mut current = class;
        while let Some(c) = current {
            if let Some(metadata) = self.metadata.get(&(id, c)) {
                return Ok(metadata.clone());
            }
            current = self.class(c).and_then(|entry| entry.base);
        }
        self.metadata
            .get(&(id, registration.owner))
            .cloned()
            .ok_or(PropertyError::InvalidOperation("property has no base metadata"))
    }
}

/// Which registration entry point is being used.
#[derive(Copy, Clone, Debug)]
struct Variant {
    read_only: bool,
    attached: bool,
}

/// A registry for classes and dependency properties.
///
/// All methods take `&self`; the tables are guarded by an internal lock and
/// user callbacks are never run while it is held. Property handles are unique
/// across every registry in the process, and [`PropertyRegistry::global`]
/// provides the process-wide instance.
///
/// # Example
///
/// ```rust
/// use understory_dependency::{ClassId, PropertyMetadata, PropertyRegistry, Value, ValueType};
///
/// let registry = PropertyRegistry::new();
/// let button = registry.register_class("Button", Some(ClassId::DEPENDENCY_OBJECT)).unwrap();
///
/// let width = registry
///     .register("Width", ValueType::FLOAT64, button, Some(PropertyMetadata::new(10.0)), None)
///     .unwrap();
///
/// assert_eq!(registry.find("Width", button), Some(width));
/// let metadata = registry.metadata(width, button).unwrap();
/// assert_eq!(metadata.default_value(), &Value::Float64(10.0));
/// ```
pub struct PropertyRegistry {
    thread_context: Arc<dyn ThreadContext>,
    inner: RwLock<RegistryInner>,
}

impl Default for PropertyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyRegistry {
    /// Creates a registry bound to the OS-thread [`CurrentThread`] context.
    #[must_use]
    pub fn new() -> Self {
        Self::with_thread_context(Arc::new(CurrentThread))
    }

    /// Creates a registry whose objects use `thread_context` for affinity.
    #[must_use]
    pub fn with_thread_context(thread_context: Arc<dyn ThreadContext>) -> Self {
        let mut inner = RegistryInner::default();
        let default_core: Arc<dyn FreezableCore> = Arc::new(DefaultFreezableCore);
        let builtins = [
            ("DependencyObject", None, None),
            ("Freezable", Some(ClassId::DEPENDENCY_OBJECT), Some(default_core)),
        ];
        for (name, base, core) in builtins {
            let name: Arc<str> = Arc::from(name);
            #[expect(clippy::cast_possible_truncation, reason = "two built-in classes")]
            let id = ClassId::new(inner.classes.len() as u32);
            inner.classes.push(ClassEntry {
                name: name.clone(),
                base,
                core,
            });
            inner.class_names.insert(name, id);
        }
        Self {
            thread_context,
            inner: RwLock::new(inner),
        }
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static Arc<Self> {
        static GLOBAL: OnceLock<Arc<PropertyRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Self::new()))
    }

    /// Returns the affinity context objects of this registry use.
    #[must_use]
    pub fn thread_context(&self) -> &dyn ThreadContext {
        &*self.thread_context
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Classes
    // =========================================================================

    /// Registers a class.
    ///
    /// `base` may be `None` for a class outside the value-holder hierarchy.
    /// Classes deriving from [`ClassId::FREEZABLE`] inherit the nearest
    /// ancestor's [`FreezableCore`].
    pub fn register_class(&self, name: &str, base: Option<ClassId>) -> Result<ClassId> {
        let id = self.write().add_class(name, base, None)?;
        log::debug!("registered class `{name}` as {id:?}");
        Ok(id)
    }

    /// Registers a freezable class with its own factory and freeze rules.
    ///
    /// `base` must derive from [`ClassId::FREEZABLE`].
    pub fn register_freezable_class(
        &self,
        name: &str,
        base: ClassId,
        core: Arc<dyn FreezableCore>,
    ) -> Result<ClassId> {
        let mut inner = self.write();
        if !inner.is_subclass_of(base, ClassId::FREEZABLE) {
            return Err(PropertyError::type_mismatch(
                "Freezable",
                inner.class_name(base),
            ));
        }
        let id = inner.add_class(name, Some(base), Some(core))?;
        drop(inner);
        log::debug!("registered freezable class `{name}` as {id:?}");
        Ok(id)
    }

    /// Returns the name of a class.
    #[must_use]
    pub fn class_name(&self, class: ClassId) -> Option<Arc<str>> {
        self.read().class(class).map(|entry| entry.name.clone())
    }

    /// Returns the base class of a class.
    #[must_use]
    pub fn base_class(&self, class: ClassId) -> Option<ClassId> {
        self.read().class(class).and_then(|entry| entry.base)
    }

    /// Returns `true` if `class` is `base` or derives from it.
    #[must_use]
    pub fn is_subclass_of(&self, class: ClassId, base: ClassId) -> bool {
        self.read().is_subclass_of(class, base)
    }

    pub(crate) fn freezable_core(&self, class: ClassId) -> Option<Arc<dyn FreezableCore>> {
        self.read().class(class).and_then(|entry| entry.core.clone())
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a property.
    ///
    /// # Errors
    ///
    /// - [`PropertyError::InvalidArgument`] for an empty name or unknown class.
    /// - [`PropertyError::UnsupportedType`] for [`ValueType::Void`].
    /// - [`PropertyError::DuplicateRegistration`] if `(name, owner)` exists.
    /// - [`PropertyError::TypeMismatch`] if the default is not assignable.
    /// - [`PropertyError::InvalidDefaultValue`] if the default is an
    ///   expression or a thread-bound object.
    /// - [`PropertyError::Validation`] if `validate` rejects the default.
    pub fn register(
        &self,
        name: &str,
        value_type: ValueType,
        owner: ClassId,
        metadata: Option<PropertyMetadata>,
        validate: Option<ValidateValueCallback>,
    ) -> Result<PropertyId> {
        let variant = Variant {
            read_only: false,
            attached: false,
        };
        self.register_common(name, value_type, owner, metadata, validate, variant)
    }

    /// Registers an attached property, settable on objects of any class.
    pub fn register_attached(
        &self,
        name: &str,
        value_type: ValueType,
        owner: ClassId,
        metadata: Option<PropertyMetadata>,
        validate: Option<ValidateValueCallback>,
    ) -> Result<PropertyId> {
        let variant = Variant {
            read_only: false,
            attached: true,
        };
        self.register_common(name, value_type, owner, metadata, validate, variant)
    }

    /// Registers a read-only property, returning its write key.
    ///
    /// When `metadata` is supplied, `owner` must derive from
    /// [`ClassId::DEPENDENCY_OBJECT`], else [`PropertyError::TypeMismatch`].
    pub fn register_read_only(
        &self,
        name: &str,
        value_type: ValueType,
        owner: ClassId,
        metadata: Option<PropertyMetadata>,
        validate: Option<ValidateValueCallback>,
    ) -> Result<PropertyKey> {
        let variant = Variant {
            read_only: true,
            attached: false,
        };
        self.register_common(name, value_type, owner, metadata, validate, variant)
            .map(PropertyKey::new)
    }

    /// Registers a read-only attached property, returning its write key.
    pub fn register_attached_read_only(
        &self,
        name: &str,
        value_type: ValueType,
        owner: ClassId,
        metadata: Option<PropertyMetadata>,
        validate: Option<ValidateValueCallback>,
    ) -> Result<PropertyKey> {
        let variant = Variant {
            read_only: true,
            attached: true,
        };
        self.register_common(name, value_type, owner, metadata, validate, variant)
            .map(PropertyKey::new)
    }

    fn register_common(
        &self,
        name: &str,
        value_type: ValueType,
        owner: ClassId,
        metadata: Option<PropertyMetadata>,
        validate: Option<ValidateValueCallback>,
        variant: Variant,
    ) -> Result<PropertyId> {
        if name.is_empty() {
            return Err(PropertyError::InvalidArgument(
                "property names must not be empty".into(),
            ));
        }
        if !value_type.is_instantiable() {
            return Err(PropertyError::UnsupportedType(value_type.to_string()));
        }
        {
            let inner = self.read();
            let owner_name = inner
                .class(owner)
                .map(|entry| entry.name.to_string())
                .ok_or_else(|| {
                    PropertyError::InvalidArgument(format!("unknown owner class {owner:?}"))
                })?;
            if let ValueType::Class(class) = value_type
                && inner.class(class).is_none()
            {
                return Err(PropertyError::InvalidArgument(format!(
                    "unknown value class {class:?}"
                )));
            }
            if inner.find(name, owner).is_some() {
                return Err(PropertyError::DuplicateRegistration {
                    name: name.into(),
                    owner: owner_name,
                });
            }
            if variant.read_only
                && !variant.attached
                && metadata.is_some()
                && !inner.is_subclass_of(owner, ClassId::DEPENDENCY_OBJECT)
            {
                return Err(PropertyError::type_mismatch("DependencyObject", owner_name));
            }
        }

        let metadata = metadata.unwrap_or_default();
        let default_value = if metadata.default_value().is_unset() {
            value_type.zero_default()
        } else {
            metadata.default_value().clone()
        };
        self.check_default(name, value_type, &default_value)?;
        if let Some(validate) = &validate
            && !validate(&default_value)
        {
            return Err(PropertyError::Validation {
                property: name.into(),
                value: format!("{default_value:?}"),
            });
        }

        let mut inner = self.write();
        if inner.find(name, owner).is_some() {
            return Err(PropertyError::DuplicateRegistration {
                name: name.into(),
                owner: inner.class_name(owner),
            });
        }
        let id = PropertyId::allocate();
        let name: Arc<str> = Arc::from(name);
        inner.properties.insert(
            id,
            Arc::new(PropertyRegistration {
                id,
                name: name.clone(),
                value_type,
                owner,
                read_only: variant.read_only,
                attached: variant.attached,
                validate,
            }),
        );
        inner
            .metadata
            .insert((id, owner), Arc::new(metadata.with_default(default_value)));
        inner.by_name.entry(owner).or_default().insert(name.clone(), id);
        drop(inner);

        log::debug!(
            "registered property `{name}` ({value_type}) on {owner:?} as {id} ({variant:?})"
        );
        Ok(id)
    }

    /// Attaches metadata for `for_class`, layered over the metadata its base
    /// class resolves to.
    ///
    /// Unspecified parts are inherited: the default value and coerce callback
    /// if not given, flags are united, and changed callbacks run base first.
    ///
    /// # Errors
    ///
    /// - [`PropertyError::ReadOnlyViolation`] for read-only properties; use
    ///   [`PropertyRegistry::override_metadata_with_key`].
    /// - [`PropertyError::TypeMismatch`] if `for_class` is not a
    ///   [`DependencyObject`](crate::DependencyObject) class, or the default
    ///   is not assignable.
    /// - [`PropertyError::InvalidOperation`] if `for_class` already has
    ///   metadata for this property.
    pub fn override_metadata(
        &self,
        property: PropertyId,
        for_class: ClassId,
        metadata: PropertyMetadata,
    ) -> Result<()> {
        self.override_common(property, for_class, metadata, false)
    }

    /// Attaches metadata for a read-only property.
    pub fn override_metadata_with_key(
        &self,
        key: &PropertyKey,
        for_class: ClassId,
        metadata: PropertyMetadata,
    ) -> Result<()> {
        self.override_common(key.property(), for_class, metadata, true)
    }

    fn override_common(
        &self,
        property: PropertyId,
        for_class: ClassId,
        metadata: PropertyMetadata,
        has_key: bool,
    ) -> Result<()> {
        let (registration, merged) = {
            let inner = self.read();
            let registration = inner.registration(property)?.clone();
            if registration.read_only && !has_key {
                return Err(PropertyError::ReadOnlyViolation(registration.name.to_string()));
            }
            let Some(entry) = inner.class(for_class) else {
                return Err(PropertyError::InvalidArgument(format!(
                    "unknown class {for_class:?}"
                )));
            };
            if !inner.is_subclass_of(for_class, ClassId::DEPENDENCY_OBJECT) {
                return Err(PropertyError::type_mismatch(
                    "DependencyObject",
                    entry.name.to_string(),
                ));
            }
            if inner.metadata.contains_key(&(property, for_class)) {
                return Err(PropertyError::InvalidOperation(
                    "metadata is already attached for this class",
                ));
            }
            let base = inner.resolve(property, entry.base)?;
            (registration, metadata.merged_over(&base))
        };

        self.check_default(&registration.name, registration.value_type, merged.default_value())?;
        if !registration.is_valid_value(merged.default_value()) {
            return Err(registration.validation_error(merged.default_value()));
        }

        let mut inner = self.write();
        if inner.metadata.contains_key(&(property, for_class)) {
            return Err(PropertyError::InvalidOperation(
                "metadata is already attached for this class",
            ));
        }
        inner.metadata.insert((property, for_class), Arc::new(merged));
        inner.resolved.retain(|(id, _), _| *id != property);
        drop(inner);

        log::debug!(
            "overrode metadata of `{}` for {for_class:?}",
            registration.name
        );
        Ok(())
    }

    fn check_default(&self, name: &str, value_type: ValueType, value: &Value) -> Result<()> {
        if !self.is_assignable(value_type, value) {
            return Err(PropertyError::type_mismatch(
                self.type_name(value_type),
                self.value_type_name(value),
            ));
        }
        let reason = match value {
            Value::Expression(_) => Some("expressions cannot be default values"),
            Value::Object(object) if !object.is_frozen() => {
                Some("default values must not be thread-bound objects")
            }
            _ => None,
        };
        match reason {
            Some(reason) => Err(PropertyError::InvalidDefaultValue {
                property: name.into(),
                reason,
            }),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Returns the registration for a property.
    #[must_use]
    pub fn property(&self, id: PropertyId) -> Option<Arc<PropertyRegistration>> {
        self.read().properties.get(&id).cloned()
    }

    pub(crate) fn registration(&self, id: PropertyId) -> Result<Arc<PropertyRegistration>> {
        self.read().registration(id).cloned()
    }

    /// Looks up a property by name and owner class.
    #[must_use]
    pub fn find(&self, name: &str, owner: ClassId) -> Option<PropertyId> {
        self.read().find(name, owner)
    }

    /// Returns the number of registered properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().properties.len()
    }

    /// Returns `true` if no properties are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().properties.is_empty()
    }

    /// Returns all registrations, ordered by handle.
    #[must_use]
    pub fn properties(&self) -> Vec<Arc<PropertyRegistration>> {
        let mut all: Vec<_> = self.read().properties.values().cloned().collect();
        all.sort_by_key(|registration| registration.id);
        all
    }

    /// Resolves the metadata that applies to `property` on instances of `class`.
    ///
    /// The most derived class in `class`'s ancestor chain with attached
    /// metadata wins; otherwise the owner's record applies. Results are cached
    /// per `(property, class)`.
    pub fn metadata(&self, property: PropertyId, class: ClassId) -> Result<Arc<PropertyMetadata>> {
        if let Some(metadata) = self.read().resolved.get(&(property, class)) {
            return Ok(metadata.clone());
        }
        let mut inner = self.write();
        let metadata = inner.resolve(property, Some(class))?;
        inner.resolved.insert((property, class), metadata.clone());
        Ok(metadata)
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// Returns `true` if `value` may be stored in a property of `value_type`.
    #[must_use]
    pub fn is_assignable(&self, value_type: ValueType, value: &Value) -> bool {
        fn scalar_matches(scalar: Scalar, value: &Value) -> bool {
            matches!(
                (scalar, value),
                (Scalar::Bool, Value::Bool(_))
                    | (Scalar::Int32, Value::Int32(_))
                    | (Scalar::Int64, Value::Int64(_))
                    | (Scalar::Float64, Value::Float64(_))
            )
        }

        match (value_type, value) {
            (ValueType::Void, _) | (_, Value::Unset) => false,
            (ValueType::Any, _) => true,
            (ValueType::Scalar(scalar), value) => scalar_matches(scalar, value),
            (ValueType::Nullable(_), Value::Null) => true,
            (ValueType::Nullable(scalar), value) => scalar_matches(scalar, value),
            (ValueType::String, Value::Null | Value::String(_)) => true,
            (ValueType::Class(_), Value::Null) => true,
            (ValueType::Class(class), Value::Object(object)) => {
                core::ptr::eq(object.registry().as_ref(), self)
                    && self.is_subclass_of(object.class(), class)
            }
            _ => false,
        }
    }

    /// Returns a display name for a declared type.
    #[must_use]
    pub fn type_name(&self, value_type: ValueType) -> String {
        match value_type {
            ValueType::Class(class) => self.read().class_name(class),
            other => other.to_string(),
        }
    }

    pub(crate) fn value_type_name(&self, value: &Value) -> String {
        match value {
            Value::Object(object) => self.read().class_name(object.class()),
            other => other.kind_name().into(),
        }
    }

    /// Checks type and validity of a value about to be stored.
    pub(crate) fn check_value(&self, registration: &PropertyRegistration, value: &Value) -> Result<()> {
        if !self.is_assignable(registration.value_type, value) {
            return Err(PropertyError::type_mismatch(
                self.type_name(registration.value_type),
                self.value_type_name(value),
            ));
        }
        if !registration.is_valid_value(value) {
            return Err(registration.validation_error(value));
        }
        Ok(())
    }
}

impl core::fmt::Debug for PropertyRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.read();
        let mut names: Vec<_> = inner
            .properties
            .values()
            .map(|registration| registration.name.clone())
            .collect();
        names.sort();
        f.debug_struct("PropertyRegistry")
            .field("classes", &inner.classes.len())
            .field("count", &inner.properties.len())
            .field("properties", &names)
            .finish()
    }
}
