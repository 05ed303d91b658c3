// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property metadata definitions.
//!
//! This module provides [`PropertyMetadata`] for storing per-owner-type
//! property configuration and [`PropertyMetadataBuilder`] for ergonomic
//! construction.

use std::sync::Arc;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::error::Result;
use crate::event::PropertyChange;
use crate::object::DependencyObject;
use crate::value::Value;

/// Callback invoked after a property's effective value changes.
///
/// Errors are returned unchanged to the caller of the mutation.
pub type PropertyChangedCallback =
    Arc<dyn Fn(&DependencyObject, &PropertyChange) -> Result<()> + Send + Sync>;

/// Callback that adjusts a value after it is stored.
///
/// Receives the base (authored) value and returns the effective value, or
/// [`Value::Unset`] to keep the base value as-is.
pub type CoerceValueCallback =
    Arc<dyn Fn(&DependencyObject, &Value) -> Result<Value> + Send + Sync>;

/// Callback that accepts or rejects a candidate value for a property.
///
/// Attached to the registration rather than the metadata, so it applies on
/// every owner type.
pub type ValidateValueCallback = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

bitflags! {
    /// Hints carried on metadata for consumers of the property system.
    ///
    /// The core does not interpret these; layout, rendering, and styling
    /// layers do.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MetadataFlags: u8 {
        /// The value flows from parents to children.
        const INHERITS = 1;
        /// Changes invalidate layout.
        const AFFECTS_LAYOUT = 1 << 1;
        /// Changes invalidate rendering.
        const AFFECTS_RENDER = 1 << 2;
        /// The property may not be animated.
        const NOT_ANIMATABLE = 1 << 3;
    }
}

/// Metadata for a dependency property on one owner type.
///
/// Metadata is immutable once attached to a registry. Overriding metadata for
/// a derived type creates a new record layered over the base record; see
/// [`PropertyRegistry::override_metadata`](crate::PropertyRegistry::override_metadata).
///
/// # Example
///
/// ```rust
/// use understory_dependency::{MetadataFlags, PropertyMetadataBuilder, Value};
///
/// let metadata = PropertyMetadataBuilder::new()
///     .default_value(100.0)
///     .flags(MetadataFlags::AFFECTS_LAYOUT)
///     .build();
///
/// assert_eq!(metadata.default_value(), &Value::Float64(100.0));
/// assert!(metadata.flags().contains(MetadataFlags::AFFECTS_LAYOUT));
/// ```
#[derive(Clone, Default)]
pub struct PropertyMetadata {
    default_value: Value,
    flags: MetadataFlags,
    changed_callbacks: SmallVec<[PropertyChangedCallback; 1]>,
    coerce_callback: Option<CoerceValueCallback>,
}

impl PropertyMetadata {
    /// Creates metadata with the given default value and nothing else.
    #[must_use]
    pub fn new(default_value: impl Into<Value>) -> Self {
        Self {
            default_value: default_value.into(),
            ..Self::default()
        }
    }

    /// Returns the default value.
    ///
    /// [`Value::Unset`] means "not specified": the registry substitutes the
    /// inherited or zero-equivalent default when the metadata is attached.
    #[must_use]
    #[inline]
    pub fn default_value(&self) -> &Value {
        &self.default_value
    }

    /// Returns the consumer flags.
    #[must_use]
    #[inline]
    pub fn flags(&self) -> MetadataFlags {
        self.flags
    }

    /// Returns whether the value inherits from parent objects.
    #[must_use]
    #[inline]
    pub fn inherits(&self) -> bool {
        self.flags.contains(MetadataFlags::INHERITS)
    }

    /// Returns whether any changed callback is set.
    #[must_use]
    #[inline]
    pub fn has_changed_callback(&self) -> bool {
        !self.changed_callbacks.is_empty()
    }

    /// Returns whether a coerce callback is set.
    #[must_use]
    #[inline]
    pub fn has_coerce_callback(&self) -> bool {
        self.coerce_callback.is_some()
    }

    /// Runs the changed callbacks in attachment order, base type first.
    pub(crate) fn on_changed(&self, target: &DependencyObject, change: &PropertyChange) -> Result<()> {
        for callback in &self.changed_callbacks {
            callback(target, change)?;
        }
        Ok(())
    }

    /// Runs the coerce callback, returning [`Value::Unset`] when there is none.
    pub(crate) fn coerce(&self, target: &DependencyObject, base: &Value) -> Result<Value> {
        match &self.coerce_callback {
            Some(callback) => callback(target, base),
            None => Ok(Value::Unset),
        }
    }

    pub(crate) fn with_default(mut self, default_value: Value) -> Self {
        self.default_value = default_value;
        self
    }

    /// Layers `self` over `base`: unspecified parts are taken from `base`,
    /// changed callbacks run base first.
    pub(crate) fn merged_over(self, base: &Self) -> Self {
        let default_value = if self.default_value.is_unset() {
            base.default_value.clone()
        } else {
            self.default_value
        };
        let mut changed_callbacks = base.changed_callbacks.clone();
        changed_callbacks.extend(self.changed_callbacks);
        Self {
            default_value,
            flags: base.flags | self.flags,
            changed_callbacks,
            coerce_callback: self.coerce_callback.or_else(|| base.coerce_callback.clone()),
        }
    }
}

impl core::fmt::Debug for PropertyMetadata {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PropertyMetadata")
            .field("default_value", &self.default_value)
            .field("flags", &self.flags)
            .field("changed_callbacks", &self.changed_callbacks.len())
            .field("has_coerce_callback", &self.coerce_callback.is_some())
            .finish()
    }
}

/// Builder for [`PropertyMetadata`].
///
/// # Example
///
/// ```rust
/// use understory_dependency::{PropertyMetadataBuilder, Value};
///
/// let metadata = PropertyMetadataBuilder::new()
///     .default_value(0.0)
///     .coerce(|_, base| Ok(Value::from(base.as_f64().unwrap_or(0.0).clamp(0.0, 1.0))))
///     .on_changed(|_, change| {
///         println!("{:?} -> {:?}", change.old_value, change.new_value);
///         Ok(())
///     })
///     .build();
/// assert!(metadata.has_coerce_callback());
/// ```
#[derive(Default)]
pub struct PropertyMetadataBuilder {
    metadata: PropertyMetadata,
}

impl core::fmt::Debug for PropertyMetadataBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PropertyMetadataBuilder")
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl PropertyMetadataBuilder {
    /// Creates a builder with no default, flags, or callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.metadata.default_value = value.into();
        self
    }

    /// Sets the consumer flags.
    #[must_use]
    pub fn flags(mut self, flags: MetadataFlags) -> Self {
        self.metadata.flags = flags;
        self
    }

    /// Adds a callback invoked when the effective value changes.
    #[must_use]
    pub fn on_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DependencyObject, &PropertyChange) -> Result<()> + Send + Sync + 'static,
    {
        self.metadata.changed_callbacks.push(Arc::new(callback));
        self
    }

    /// Sets the coerce callback.
    #[must_use]
    pub fn coerce<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DependencyObject, &Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.metadata.coerce_callback = Some(Arc::new(callback));
        self
    }

    /// Builds the [`PropertyMetadata`].
    #[must_use]
    pub fn build(self) -> PropertyMetadata {
        self.metadata
    }
}
