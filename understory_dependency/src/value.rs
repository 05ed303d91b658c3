// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamically typed property values.
//!
//! This module provides [`Value`], the runtime representation of every
//! property value, and [`Expression`], an opaque placeholder for values that
//! are computed by higher layers (bindings, resources).

use std::sync::Arc;

use crate::freezable::Freezable;
use crate::object::DependencyObject;

/// An opaque deferred-value placeholder.
///
/// Expressions are produced and evaluated by layers above this crate. They
/// can be stored in `Any`-typed properties but are never valid defaults.
/// Equality is by identity.
#[derive(Clone, Debug)]
pub struct Expression(Arc<str>);

impl Expression {
    /// Creates a placeholder with a human-readable description.
    #[must_use]
    pub fn new(description: &str) -> Self {
        Self(Arc::from(description))
    }

    /// Returns the description this placeholder was created with.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A property value.
///
/// # Example
///
/// ```rust
/// use understory_dependency::Value;
///
/// let width = Value::from(12.5);
/// assert_eq!(width.as_f64(), Some(12.5));
/// assert_eq!(Value::from("x"), Value::from(String::from("x")));
/// assert!(Value::Unset.is_unset());
/// ```
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// No value. Returned by coerce callbacks to keep the base value, and by
    /// [`DependencyObject::read_local_value`] when nothing is set locally.
    #[default]
    Unset,
    /// The null reference.
    Null,
    /// A `bool`.
    Bool(bool),
    /// An `i32`.
    Int32(i32),
    /// An `i64`.
    Int64(i64),
    /// An `f64`.
    Float64(f64),
    /// An immutable shared string.
    String(Arc<str>),
    /// A dependency object or freezable.
    Object(DependencyObject),
    /// A deferred-value placeholder.
    Expression(Expression),
}

impl Value {
    /// Returns `true` for [`Value::Unset`].
    #[must_use]
    #[inline]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the contained `bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the contained `i32`.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the contained `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the contained `f64`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the contained string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the contained object.
    #[must_use]
    pub fn as_object(&self) -> Option<&DependencyObject> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the contained object as a [`Freezable`], if it is one.
    #[must_use]
    pub fn as_freezable(&self) -> Option<Freezable> {
        self.as_object().and_then(DependencyObject::as_freezable)
    }

    /// A short name for the runtime type, used in diagnostics.
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::Unset => "Unset",
            Self::Null => "Null",
            Self::Bool(_) => "Bool",
            Self::Int32(_) => "Int32",
            Self::Int64(_) => "Int64",
            Self::Float64(_) => "Float64",
            Self::String(_) => "String",
            Self::Object(_) => "Object",
            Self::Expression(_) => "Expression",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unset, Self::Unset) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            // NaN compares equal to itself so a NaN write is not a change.
            (Self::Float64(a), Self::Float64(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Expression(a), Self::Expression(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<DependencyObject> for Value {
    fn from(value: DependencyObject) -> Self {
        Self::Object(value)
    }
}

impl From<Freezable> for Value {
    fn from(value: Freezable) -> Self {
        Self::Object(value.into_object())
    }
}

impl From<&Freezable> for Value {
    fn from(value: &Freezable) -> Self {
        Self::Object(value.as_object().clone())
    }
}

impl From<Expression> for Value {
    fn from(value: Expression) -> Self {
        Self::Expression(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_equality_is_exact() {
        assert_eq!(Value::from(1_i32), Value::Int32(1));
        assert_ne!(Value::from(1_i32), Value::from(1_i64));
        assert_ne!(Value::Null, Value::Unset);
    }

    #[test]
    fn float_equality_treats_nan_as_equal() {
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_eq!(Value::from(0.0), Value::from(-0.0));
        assert_ne!(Value::from(1.0), Value::from(2.0));
    }

    #[test]
    fn expressions_compare_by_identity() {
        let a = Expression::new("binding");
        let b = Expression::new("binding");
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn option_maps_none_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3_i32)), Value::Int32(3));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(7_i64).as_i64(), Some(7));
        assert_eq!(Value::from(7_i64).as_i32(), None);
        assert!(Value::default().is_unset());
        assert!(Value::Null.is_null());
    }
}
