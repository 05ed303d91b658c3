// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for registration, the value pipeline, and freezable operations.

use thiserror::Error;

/// Errors raised by the property system.
///
/// Every error is raised synchronously at the point of violation. Nothing in
/// this crate retries or swallows an error, except for the documented no-ops
/// (clearing an absent value, re-freezing a frozen object, adding or removing
/// a `None` handler).
#[derive(Debug, Error)]
pub enum PropertyError {
    /// A property or class with the same name is already registered.
    #[error("`{name}` is already registered on `{owner}`")]
    DuplicateRegistration {
        /// The registered name.
        name: String,
        /// The owner type the name collided on.
        owner: String,
    },

    /// The declared value type cannot hold values.
    #[error("`{0}` cannot be used as a property value type")]
    UnsupportedType(String),

    /// A value or type is not assignable to the expected type.
    #[error("expected a value assignable to `{expected}`, found `{actual}`")]
    TypeMismatch {
        /// The declared type.
        expected: String,
        /// The runtime type that was offered.
        actual: String,
    },

    /// The default value in a metadata record is not allowed.
    #[error("invalid default value for `{property}`: {reason}")]
    InvalidDefaultValue {
        /// Property name.
        property: String,
        /// Why the default was rejected.
        reason: &'static str,
    },

    /// The property's validate callback rejected a value.
    #[error("value `{value}` is not valid for `{property}`")]
    Validation {
        /// Property name.
        property: String,
        /// Debug rendering of the rejected value.
        value: String,
    },

    /// A read-only property was mutated without its [`PropertyKey`](crate::PropertyKey).
    #[error("`{0}` is read-only")]
    ReadOnlyViolation(String),

    /// A mutable object was accessed from a thread other than its owner.
    #[error("the calling thread does not own this object")]
    ThreadAffinity,

    /// The operation is not valid in the object's current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// A call argument was malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An error raised by a user callback, passed through unchanged.
    #[error("{0}")]
    Callback(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PropertyError {
    /// Wraps an arbitrary error raised from a user callback.
    pub fn callback<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Callback(Box::new(err))
    }

    pub(crate) fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = PropertyError> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn messages_name_the_offender() {
        let err = PropertyError::DuplicateRegistration {
            name: "Width".into(),
            owner: "Button".into(),
        };
        assert_eq!(err.to_string(), "`Width` is already registered on `Button`");

        let err = PropertyError::type_mismatch("Int32", "Int64");
        assert!(err.to_string().contains("Int32"));
        assert!(err.to_string().contains("Int64"));
    }

    #[test]
    fn callback_errors_keep_their_message() {
        let err = PropertyError::callback(Boom);
        assert_eq!(err.to_string(), "boom");
        assert!(matches!(err, PropertyError::Callback(_)));
    }

    #[test]
    fn callback_errors_keep_their_cause() {
        let err = PropertyError::callback(Boom);
        let cause = std::error::Error::source(&err).unwrap();
        assert_eq!(cause.to_string(), "boom");
        assert!(cause.downcast_ref::<Boom>().is_some());
    }
}
