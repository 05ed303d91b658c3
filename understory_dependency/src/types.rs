// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Declared value types.

use core::fmt;

use crate::id::ClassId;
use crate::value::Value;

/// Scalar kinds that can be held by value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scalar {
    /// `bool`.
    Bool,
    /// `i32`.
    Int32,
    /// `i64`.
    Int64,
    /// `f64`.
    Float64,
}

impl Scalar {
    fn zero(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int32 => Value::Int32(0),
            Self::Int64 => Value::Int64(0),
            Self::Float64 => Value::Float64(0.0),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Float64 => "Float64",
        }
    }
}

/// The declared type of a property's values.
///
/// Assignability is exact: an `Int32` value is not assignable to an `Int64`
/// property. `Null` is assignable only to nullable and reference types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Marker for "no value". Cannot be registered.
    Void,
    /// Any value, including `Null`.
    Any,
    /// A non-nullable scalar.
    Scalar(Scalar),
    /// A scalar or `Null`.
    Nullable(Scalar),
    /// A string or `Null`.
    String,
    /// An object whose class derives from the given class, or `Null`.
    Class(ClassId),
}

impl ValueType {
    /// `bool`.
    pub const BOOL: Self = Self::Scalar(Scalar::Bool);
    /// `i32`.
    pub const INT32: Self = Self::Scalar(Scalar::Int32);
    /// `i64`.
    pub const INT64: Self = Self::Scalar(Scalar::Int64);
    /// `f64`.
    pub const FLOAT64: Self = Self::Scalar(Scalar::Float64);

    /// Returns `true` if `Null` is assignable to this type.
    #[must_use]
    pub fn is_nullable(self) -> bool {
        !matches!(self, Self::Void | Self::Scalar(_))
    }

    /// Returns `true` if values of this type can exist.
    #[must_use]
    pub fn is_instantiable(self) -> bool {
        self != Self::Void
    }

    /// The default used when metadata does not specify one.
    ///
    /// Scalars default to their zero value, everything else to `Null`.
    #[must_use]
    pub fn zero_default(self) -> Value {
        match self {
            Self::Scalar(scalar) => scalar.zero(),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("Void"),
            Self::Any => f.write_str("Any"),
            Self::Scalar(scalar) => f.write_str(scalar.name()),
            Self::Nullable(scalar) => write!(f, "Nullable<{}>", scalar.name()),
            Self::String => f.write_str("String"),
            Self::Class(class) => write!(f, "Class({})", class.index()),
        }
    }
}
