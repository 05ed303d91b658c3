// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dependency objects and the value pipeline.
//!
//! [`DependencyObject`] is a shared handle to an object instance: its class,
//! its [`EffectiveValueStore`], its owning thread, and its change
//! subscribers. Every read and write goes through the pipeline here:
//!
//! 1. affinity and frozen checks
//! 2. read-only, type, and validation checks
//! 3. store the local value
//! 4. coerce
//! 5. compare old and new effective values, then notify
//!
//! Locks are never held while callbacks or handlers run, so they may freely
//! re-enter the object.

use core::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use smallvec::SmallVec;

use crate::affinity::OwnerId;
use crate::error::{PropertyError, Result};
use crate::event::{ChangeKind, ChangedEventArgs, ChangedHandler, HandlerList, PropertyChange};
use crate::freezable::{Freezable, FreezableCore};
use crate::id::{ClassId, PropertyId, PropertyKey};
use crate::metadata::PropertyMetadata;
use crate::registry::{PropertyRegistration, PropertyRegistry};
use crate::store::{EffectiveValueEntry, EffectiveValueStore};
use crate::types::ValueType;
use crate::value::Value;

pub(crate) struct ObjectInner {
    registry: Arc<PropertyRegistry>,
    class: ClassId,
    /// Present exactly for freezables.
    core: Option<Arc<dyn FreezableCore>>,
    state: RwLock<ObjectState>,
}

struct ObjectState {
    /// `None` once frozen.
    owner: Option<OwnerId>,
    frozen: bool,
    store: EffectiveValueStore,
    handlers: HandlerList,
    /// Subscription this object places on freezables it holds.
    link: Option<ChangedHandler>,
}

/// A shared handle to an object that holds dependency property values.
///
/// Cloning the handle does not copy the object; use
/// [`Freezable::clone_freezable`] for that. Equality of handles is identity
/// ([`DependencyObject::ptr_eq`]).
///
/// A plain `DependencyObject` is bound to the thread that created it for its
/// whole life. [`Freezable`]s lift that restriction once frozen.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use understory_dependency::{ClassId, DependencyObject, PropertyRegistry, Value, ValueType};
///
/// let registry = Arc::new(PropertyRegistry::new());
/// let owner = registry.register_class("Owner", Some(ClassId::DEPENDENCY_OBJECT)).unwrap();
/// let age = registry.register("Age", ValueType::INT32, owner, None, None).unwrap();
///
/// let person = DependencyObject::new(&registry, owner).unwrap();
/// assert_eq!(person.get_value(age).unwrap(), Value::Int32(0));
///
/// person.set_value(age, 5).unwrap();
/// assert_eq!(person.get_value(age).unwrap(), Value::Int32(5));
///
/// person.clear_value(age).unwrap();
/// assert_eq!(person.get_value(age).unwrap(), Value::Int32(0));
/// ```
#[derive(Clone)]
pub struct DependencyObject {
    inner: Arc<ObjectInner>,
}

impl DependencyObject {
    /// Creates an instance of a non-freezable class, owned by the calling thread.
    ///
    /// # Errors
    ///
    /// [`PropertyError::TypeMismatch`] if `class` does not derive from
    /// [`ClassId::DEPENDENCY_OBJECT`] or derives from [`ClassId::FREEZABLE`]
    /// (use [`Freezable::new`] for those).
    pub fn new(registry: &Arc<PropertyRegistry>, class: ClassId) -> Result<Self> {
        if !registry.is_subclass_of(class, ClassId::DEPENDENCY_OBJECT)
            || registry.is_subclass_of(class, ClassId::FREEZABLE)
        {
            return Err(PropertyError::type_mismatch(
                "DependencyObject",
                registry.type_name(ValueType::Class(class)),
            ));
        }
        Ok(Self::create(registry, class, None))
    }

    pub(crate) fn create(
        registry: &Arc<PropertyRegistry>,
        class: ClassId,
        core: Option<Arc<dyn FreezableCore>>,
    ) -> Self {
        let owner = registry.thread_context().current();
        Self {
            inner: Arc::new(ObjectInner {
                registry: registry.clone(),
                class,
                core,
                state: RwLock::new(ObjectState {
                    owner: Some(owner),
                    frozen: false,
                    store: EffectiveValueStore::new(),
                    handlers: HandlerList::default(),
                    link: None,
                }),
            }),
        }
    }

    /// Returns the registry this object resolves properties against.
    #[must_use]
    #[inline]
    pub fn registry(&self) -> &Arc<PropertyRegistry> {
        &self.inner.registry
    }

    /// Returns the object's class.
    #[must_use]
    #[inline]
    pub fn class(&self) -> ClassId {
        self.inner.class
    }

    /// Returns `true` if both handles refer to the same object.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns `true` if this object is a [`Freezable`].
    #[must_use]
    #[inline]
    pub fn is_freezable(&self) -> bool {
        self.inner.core.is_some()
    }

    /// Returns this object as a [`Freezable`], if it is one.
    #[must_use]
    pub fn as_freezable(&self) -> Option<Freezable> {
        self.is_freezable().then(|| Freezable::from_object(self.clone()))
    }

    /// Returns `true` once the object is frozen. Callable from any thread.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.state().frozen
    }

    /// Returns the owning context, or `None` once frozen. Callable from any
    /// thread.
    #[must_use]
    pub fn owner_thread(&self) -> Option<OwnerId> {
        self.state().owner
    }

    /// Checks that the caller may use this object: it is frozen, or the
    /// caller is its owner.
    pub fn verify_access(&self) -> Result<()> {
        self.read_checked().map(drop)
    }

    pub(crate) fn core(&self) -> Option<&Arc<dyn FreezableCore>> {
        self.inner.core.as_ref()
    }

    fn downgrade(&self) -> Weak<ObjectInner> {
        Arc::downgrade(&self.inner)
    }

    // =========================================================================
    // State access
    // =========================================================================

    fn state(&self) -> RwLockReadGuard<'_, ObjectState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, ObjectState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_owner(&self, state: &ObjectState) -> bool {
        state
            .owner
            .is_some_and(|owner| self.inner.registry.thread_context().is_current(owner))
    }

    /// Read access: frozen objects from anywhere, mutable ones from the owner.
    fn read_checked(&self) -> Result<RwLockReadGuard<'_, ObjectState>> {
        let state = self.state();
        if !state.frozen && !self.is_owner(&state) {
            return Err(PropertyError::ThreadAffinity);
        }
        Ok(state)
    }

    /// Write access: never when frozen, otherwise only from the owner.
    fn write_checked(&self) -> Result<RwLockWriteGuard<'_, ObjectState>> {
        let state = self.state_mut();
        if state.frozen {
            return Err(PropertyError::InvalidOperation(
                "cannot modify a frozen object",
            ));
        }
        if !self.is_owner(&state) {
            return Err(PropertyError::ThreadAffinity);
        }
        Ok(state)
    }

    fn metadata(&self, property: PropertyId) -> Result<Arc<PropertyMetadata>> {
        self.inner.registry.metadata(property, self.inner.class)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Returns the effective value: coerced, else local, else the default
    /// resolved for this object's class.
    ///
    /// # Errors
    ///
    /// [`PropertyError::ThreadAffinity`] from a non-owner thread while
    /// mutable; [`PropertyError::InvalidArgument`] for an unknown property.
    pub fn get_value(&self, property: PropertyId) -> Result<Value> {
        let state = self.read_checked()?;
        if let Some(value) = state.store.effective(property) {
            return Ok(value.clone());
        }
        drop(state);
        Ok(self.metadata(property)?.default_value().clone())
    }

    /// Returns the authored value, or [`Value::Unset`] if there is none.
    pub fn read_local_value(&self, property: PropertyId) -> Result<Value> {
        let state = self.read_checked()?;
        Ok(state.store.get_local(property).cloned().unwrap_or_default())
    }

    /// Returns `true` if the property has an authored value.
    pub fn has_local_value(&self, property: PropertyId) -> Result<bool> {
        let state = self.read_checked()?;
        Ok(state.store.get_local(property).is_some())
    }

    /// Copies out every stored entry.
    pub(crate) fn entries(&self) -> Result<Vec<(PropertyId, EffectiveValueEntry)>> {
        let state = self.read_checked()?;
        Ok(state
            .store
            .iter()
            .map(|(id, entry)| (id, entry.clone()))
            .collect())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Sets the local value.
    ///
    /// Passing [`Value::Unset`] is the same as [`DependencyObject::clear_value`].
    ///
    /// # Errors
    ///
    /// - [`PropertyError::InvalidOperation`] if the object is frozen.
    /// - [`PropertyError::ThreadAffinity`] from a non-owner thread.
    /// - [`PropertyError::ReadOnlyViolation`] for read-only properties; use
    ///   [`DependencyObject::set_value_with_key`].
    /// - [`PropertyError::TypeMismatch`] if the value, or the coerced value,
    ///   is not assignable.
    /// - [`PropertyError::Validation`] if the validate callback rejects it.
    /// - Any error returned by a coerce or changed callback.
    ///
    /// Errors raised before the changed callbacks run leave the store as it
    /// was. Errors raised by changed callbacks leave the new value in place;
    /// the change handlers are still notified before the first such error is
    /// returned.
    pub fn set_value(&self, property: PropertyId, value: impl Into<Value>) -> Result<()> {
        self.set_common(property, value.into(), false)
    }

    /// Sets the local value of a read-only property.
    pub fn set_value_with_key(&self, key: &PropertyKey, value: impl Into<Value>) -> Result<()> {
        self.set_common(key.property(), value.into(), true)
    }

    /// Removes the local value so the property falls back to its default.
    ///
    /// Clearing a property with no value is a no-op. The default is not
    /// coerced.
    pub fn clear_value(&self, property: PropertyId) -> Result<()> {
        let registration = self.writable_registration(property, false)?;
        self.clear_common(&registration)
    }

    /// Removes the local value of a read-only property.
    pub fn clear_value_with_key(&self, key: &PropertyKey) -> Result<()> {
        let registration = self.writable_registration(key.property(), true)?;
        self.clear_common(&registration)
    }

    /// Re-runs coercion on the current base value (local, else default).
    ///
    /// Notifies only if the effective value actually changes. If the coerce
    /// callback fails or returns an invalid value the store is unchanged.
    pub fn coerce_value(&self, property: PropertyId) -> Result<()> {
        drop(self.write_checked()?);
        let registration = self.inner.registry.registration(property)?;
        let metadata = self.metadata(property)?;

        let (previous, base, old_value) = {
            let state = self.state();
            let previous = state.store.entry(property).cloned();
            let base = state
                .store
                .get_local(property)
                .cloned()
                .unwrap_or_else(|| metadata.default_value().clone());
            let old_value = previous
                .as_ref()
                .map_or_else(|| metadata.default_value().clone(), |entry| entry.effective().clone());
            (previous, base, old_value)
        };

        let coerced = self.run_coercion(&registration, &metadata, &base)?;
        let new_value = coerced.clone().unwrap_or(base);
        self.write_checked()?.store.set_coerced(property, coerced);
        log::trace!("coerced {} on {:?}", registration.name(), self.inner.class);

        self.finish_change(&registration, &metadata, old_value, new_value, previous)
    }

    fn writable_registration(
        &self,
        property: PropertyId,
        has_key: bool,
    ) -> Result<Arc<PropertyRegistration>> {
        drop(self.write_checked()?);
        let registration = self.inner.registry.registration(property)?;
        if registration.is_read_only() && !has_key {
            return Err(PropertyError::ReadOnlyViolation(registration.name().into()));
        }
        Ok(registration)
    }

    fn set_common(&self, property: PropertyId, value: Value, has_key: bool) -> Result<()> {
        let registration = self.writable_registration(property, has_key)?;
        if value.is_unset() {
            return self.clear_common(&registration);
        }
        self.inner.registry.check_value(&registration, &value)?;
        let metadata = self.metadata(property)?;

        let (previous, old_value) = {
            let mut state = self.write_checked()?;
            let old_value = state
                .store
                .effective(property)
                .cloned()
                .unwrap_or_else(|| metadata.default_value().clone());
            (state.store.set_local(property, value.clone()), old_value)
        };
        log::trace!("set {} on {:?}", registration.name(), self.inner.class);

        let coerced = match self.run_coercion(&registration, &metadata, &value) {
            Ok(coerced) => coerced,
            Err(err) => {
                self.restore(property, previous);
                return Err(err);
            }
        };
        let new_value = coerced.clone().unwrap_or(value);
        self.write_checked()?.store.set_coerced(property, coerced);

        self.finish_change(&registration, &metadata, old_value, new_value, previous)
    }

    fn clear_common(&self, registration: &PropertyRegistration) -> Result<()> {
        let property = registration.id();
        let metadata = self.metadata(property)?;
        let Some(previous) = self.write_checked()?.store.remove(property) else {
            return Ok(());
        };
        log::trace!("cleared {} on {:?}", registration.name(), self.inner.class);
        let old_value = previous.effective().clone();
        let new_value = metadata.default_value().clone();
        self.finish_change(registration, &metadata, old_value, new_value, Some(previous))
    }

    /// Runs the coerce callback against `base`.
    ///
    /// Returns `None` when the base value stands, or the checked coerced value.
    fn run_coercion(
        &self,
        registration: &PropertyRegistration,
        metadata: &PropertyMetadata,
        base: &Value,
    ) -> Result<Option<Value>> {
        let coerced = metadata.coerce(self, base)?;
        if coerced.is_unset() || coerced == *base {
            return Ok(None);
        }
        self.inner.registry.check_value(registration, &coerced)?;
        Ok(Some(coerced))
    }

    fn restore(&self, property: PropertyId, previous: Option<EffectiveValueEntry>) {
        self.state_mut().store.replace(property, previous);
    }

    fn finish_change(
        &self,
        registration: &PropertyRegistration,
        metadata: &PropertyMetadata,
        old_value: Value,
        new_value: Value,
        previous: Option<EffectiveValueEntry>,
    ) -> Result<()> {
        if old_value == new_value {
            return Ok(());
        }
        let property = registration.id();
        if self.is_freezable()
            && let Err(err) = self.relink(&old_value, &new_value)
        {
            self.restore(property, previous);
            return Err(err);
        }
        let change = PropertyChange {
            property,
            old_value,
            new_value,
        };
        // Handlers hear about the stored value even when a callback fails.
        let result = metadata.on_changed(self, &change);
        self.raise(ChangeKind::Property(change));
        result
    }

    // =========================================================================
    // Freezable links
    // =========================================================================

    /// Moves this host's subscription from the old freezable value to the new one.
    fn relink(&self, old_value: &Value, new_value: &Value) -> Result<()> {
        if let Some(child) = new_value.as_freezable()
            && !child.is_frozen()
        {
            let link = self.link_handler();
            child.add_changed_handler(Some(&link))?;
        }
        if let Some(child) = old_value.as_freezable() {
            let link = self.state().link.clone();
            if let Some(link) = link {
                child.unlink(&link);
            }
        }
        Ok(())
    }

    fn link_handler(&self) -> ChangedHandler {
        let mut state = self.state_mut();
        if let Some(link) = &state.link {
            return link.clone();
        }
        let host = self.downgrade();
        let link = ChangedHandler::new(move |_| {
            if let Some(inner) = host.upgrade() {
                DependencyObject { inner }.raise(ChangeKind::SubPropertyChanged);
            }
        });
        state.link = Some(link.clone());
        link
    }

    /// Drops a host subscription, if still present.
    fn unlink(&self, link: &ChangedHandler) {
        let mut state = self.state_mut();
        if !state.frozen {
            state.handlers.remove(link);
        }
    }

    // =========================================================================
    // Notification
    // =========================================================================

    /// Subscribes to change notifications.
    ///
    /// `None` is a no-op.
    ///
    /// # Errors
    ///
    /// [`PropertyError::InvalidOperation`] if the object is frozen, from any
    /// thread; [`PropertyError::ThreadAffinity`] from a non-owner thread.
    pub fn add_changed_handler(&self, handler: Option<&ChangedHandler>) -> Result<()> {
        let mut state = self.write_checked()?;
        if let Some(handler) = handler {
            state.handlers.push(handler.clone());
        }
        Ok(())
    }

    /// Removes one subscription of `handler`.
    ///
    /// `None` is a no-op.
    ///
    /// # Errors
    ///
    /// As [`DependencyObject::add_changed_handler`], plus
    /// [`PropertyError::InvalidArgument`] if `handler` is not subscribed.
    pub fn remove_changed_handler(&self, handler: Option<&ChangedHandler>) -> Result<()> {
        let mut state = self.write_checked()?;
        match handler {
            Some(handler) if !state.handlers.remove(handler) => Err(
                PropertyError::InvalidArgument("handler is not subscribed".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Notifies a snapshot of the current subscribers.
    pub(crate) fn raise(&self, kind: ChangeKind) {
        let handlers = {
            let state = self.state();
            if state.handlers.is_empty() {
                return;
            }
            state.handlers.snapshot()
        };
        self.dispatch(&handlers, kind);
    }

    pub(crate) fn dispatch(&self, handlers: &[ChangedHandler], kind: ChangeKind) {
        if handlers.is_empty() {
            return;
        }
        let args = ChangedEventArgs {
            sender: self.clone(),
            kind,
        };
        for handler in handlers {
            handler.call(&args);
        }
    }

    /// Transitions to frozen, returning the subscribers it had.
    ///
    /// The object releases its owner, its subscribers, and its link handler.
    pub(crate) fn mark_frozen(&self) -> SmallVec<[ChangedHandler; 2]> {
        let mut state = self.state_mut();
        state.frozen = true;
        state.owner = None;
        state.link = None;
        state.handlers.take()
    }
}

impl fmt::Debug for DependencyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("DependencyObject");
        debug
            .field("class", &self.inner.class)
            .field("freezable", &self.is_freezable());
        if let Ok(state) = self.inner.state.try_read() {
            debug
                .field("frozen", &state.frozen)
                .field("entries", &state.store.len());
        }
        debug.finish_non_exhaustive()
    }
}
