// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change notification.
//!
//! Every object carries a multicast list of [`ChangedHandler`]s. Dispatch runs
//! over a snapshot, so handlers added or removed while a notification is in
//! flight only take effect for the next one.

use core::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::id::PropertyId;
use crate::object::DependencyObject;
use crate::value::Value;

/// A change to one property's effective value.
#[derive(Clone, Debug)]
pub struct PropertyChange {
    /// The property whose effective value changed.
    pub property: PropertyId,
    /// The effective value before the change.
    pub old_value: Value,
    /// The effective value after the change.
    pub new_value: Value,
}

/// What a change notification reports.
#[derive(Clone, Debug)]
pub enum ChangeKind {
    /// A property's effective value changed.
    Property(PropertyChange),
    /// A freezable held in one of the object's properties changed.
    SubPropertyChanged,
    /// The object was frozen. This is the last notification it raises.
    Frozen,
}

/// Arguments passed to a [`ChangedHandler`].
#[derive(Clone, Debug)]
pub struct ChangedEventArgs {
    /// The object raising the notification.
    pub sender: DependencyObject,
    /// What changed.
    pub kind: ChangeKind,
}

/// A subscriber to an object's change notifications.
///
/// Handlers are compared by identity: removing a handler removes one
/// subscription made with a clone of the same `ChangedHandler`.
///
/// # Example
///
/// ```rust
/// use understory_dependency::{ChangeKind, ChangedHandler};
///
/// let handler = ChangedHandler::new(|args| {
///     if let ChangeKind::Property(change) = &args.kind {
///         println!("{:?} changed", change.property);
///     }
/// });
/// assert!(handler.ptr_eq(&handler.clone()));
/// ```
#[derive(Clone)]
pub struct ChangedHandler(Arc<dyn Fn(&ChangedEventArgs) + Send + Sync>);

impl ChangedHandler {
    /// Wraps a closure as a handler.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ChangedEventArgs) + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    /// Returns `true` if both values refer to the same subscription target.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn call(&self, args: &ChangedEventArgs) {
        (self.0)(args);
    }
}

impl fmt::Debug for ChangedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChangedHandler")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// Ordered multicast subscriber list.
#[derive(Clone, Debug, Default)]
pub(crate) struct HandlerList {
    handlers: SmallVec<[ChangedHandler; 2]>,
}

impl HandlerList {
    pub(crate) fn push(&mut self, handler: ChangedHandler) {
        self.handlers.push(handler);
    }

    /// Removes the most recent subscription of `handler`.
    ///
    /// Returns `false` if it was not subscribed.
    pub(crate) fn remove(&mut self, handler: &ChangedHandler) -> bool {
        match self.handlers.iter().rposition(|h| h.ptr_eq(handler)) {
            Some(index) => {
                self.handlers.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub(crate) fn snapshot(&self) -> SmallVec<[ChangedHandler; 2]> {
        self.handlers.clone()
    }

    pub(crate) fn take(&mut self) -> SmallVec<[ChangedHandler; 2]> {
        core::mem::take(&mut self.handlers)
    }
}
