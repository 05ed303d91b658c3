// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Dependency: a dependency property registry with freezable
//! object graphs.
//!
//! This crate provides the core of a WPF/WinUI-style dependency property
//! system: a registry of typed properties with per-class metadata, objects
//! that hold sparse property values behind a coerce-and-notify pipeline, and
//! freezable objects that can be made immutable and shared across threads.
//!
//! ## Core Concepts
//!
//! ### Registry
//!
//! [`PropertyRegistry`] maps `(name, owner class)` to a process-unique
//! [`PropertyId`]. Each property has a declared [`ValueType`], an optional
//! validate callback, and [`PropertyMetadata`] (default value, coerce and
//! changed callbacks, consumer flags). Derived classes can
//! [override](PropertyRegistry::override_metadata) metadata; resolution
//! walks the class chain to the most derived record.
//!
//! Read-only properties return a [`PropertyKey`], the capability required to
//! write them.
//!
//! ### Objects and the value pipeline
//!
//! [`DependencyObject`] stores authored values in an [`EffectiveValueStore`].
//! Every write is type-checked, validated, stored, coerced, and compared
//! against the previous effective value; only real changes reach the
//! metadata's changed callbacks and the object's [`ChangedHandler`]s.
//!
//! Mutable objects are bound to the thread that created them. The binding is
//! checked through a [`ThreadContext`], [`CurrentThread`] by default.
//!
//! ### Freezables
//!
//! A [`Freezable`] can be frozen: it becomes immutable, drops its thread
//! affinity and its subscribers, and can be shared freely. Freezing and
//! cloning are deep over the freezables held in non-read-only properties.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use understory_dependency::{
//!     ChangedHandler, ClassId, DependencyObject, PropertyMetadataBuilder, PropertyRegistry,
//!     Value, ValueType,
//! };
//!
//! let registry = Arc::new(PropertyRegistry::new());
//! let person = registry
//!     .register_class("Person", Some(ClassId::DEPENDENCY_OBJECT))
//!     .unwrap();
//!
//! let age = registry
//!     .register(
//!         "Age",
//!         ValueType::INT32,
//!         person,
//!         Some(
//!             PropertyMetadataBuilder::new()
//!                 .coerce(|_, base| Ok(Value::from(base.as_i32().unwrap_or(0).max(0))))
//!                 .build(),
//!         ),
//!         None,
//!     )
//!     .unwrap();
//!
//! let alice = DependencyObject::new(&registry, person).unwrap();
//! alice
//!     .add_changed_handler(Some(&ChangedHandler::new(|args| {
//!         println!("{:?}", args.kind);
//!     })))
//!     .unwrap();
//!
//! alice.set_value(age, 30).unwrap();
//! assert_eq!(alice.get_value(age).unwrap(), Value::Int32(30));
//!
//! // Coercion applies to the effective value; the authored value is kept.
//! alice.set_value(age, -4).unwrap();
//! assert_eq!(alice.get_value(age).unwrap(), Value::Int32(0));
//! assert_eq!(alice.read_local_value(age).unwrap(), Value::Int32(-4));
//! ```
//!
//! ## Logging
//!
//! Registration and freezing are reported through the [`log`] facade at
//! `debug` level; individual value writes at `trace` level.

mod affinity;
mod error;
mod event;
mod freezable;
mod id;
mod metadata;
mod object;
mod registry;
mod store;
mod types;
mod value;

pub use affinity::{CurrentThread, OwnerId, ThreadContext};
pub use error::{PropertyError, Result};
pub use event::{ChangeKind, ChangedEventArgs, ChangedHandler, PropertyChange};
pub use freezable::{DefaultFreezableCore, Freezable, FreezableCore};
pub use id::{ClassId, PropertyId, PropertyKey};
pub use metadata::{
    CoerceValueCallback, MetadataFlags, PropertyChangedCallback, PropertyMetadata,
    PropertyMetadataBuilder, ValidateValueCallback,
};
pub use object::DependencyObject;
pub use registry::{PropertyRegistration, PropertyRegistry};
pub use store::{EffectiveValueEntry, EffectiveValueStore};
pub use types::{Scalar, ValueType};
pub use value::{Expression, Value};
