// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-object sparse property storage.
//!
//! This module provides [`EffectiveValueStore`] for storing property values on
//! objects, using sparse storage to minimize memory for objects with few
//! properties set.
//!
//! # Implementation
//!
//! Following the `WinUI` approach, we use a sorted vector with binary search
//! rather than a hash map. This provides:
//!
//! - Better cache locality (contiguous memory)
//! - Lower memory overhead (no hash buckets)
//! - O(log n) lookup, which is fast for typical property counts (5-20)
//! - Inline storage for small property sets via `SmallVec`
//!
//! # Scope
//!
//! The store only holds values. Defaults, coercion, and notification are the
//! value pipeline's job (see [`DependencyObject`](crate::DependencyObject)).

use smallvec::SmallVec;

use crate::id::PropertyId;
use crate::value::Value;

/// Default inline capacity for property entries.
///
/// Most objects have fewer than 8 non-default properties set,
/// so this avoids heap allocation in the common case.
const INLINE_CAPACITY: usize = 8;

/// The stored state of one property on one object.
///
/// An entry holds the authored (local) value, the coerced value when coercion
/// produced something different, or both. A property with neither has no
/// entry at all.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectiveValueEntry {
    local: Value,
    coerced: Option<Value>,
}

impl EffectiveValueEntry {
    /// Creates an entry holding an authored value.
    #[must_use]
    pub fn with_local(local: Value) -> Self {
        Self {
            local,
            coerced: None,
        }
    }

    /// Returns the authored value, or [`Value::Unset`] if the entry exists
    /// only because a coercion changed the default.
    #[must_use]
    #[inline]
    pub fn local(&self) -> &Value {
        &self.local
    }

    /// Returns the coerced value, if coercion changed the base value.
    #[must_use]
    #[inline]
    pub fn coerced(&self) -> Option<&Value> {
        self.coerced.as_ref()
    }

    /// Returns `true` if the entry holds an authored value.
    #[must_use]
    #[inline]
    pub fn has_local(&self) -> bool {
        !self.local.is_unset()
    }

    /// Returns the value observed through `get_value`.
    #[must_use]
    #[inline]
    pub fn effective(&self) -> &Value {
        self.coerced.as_ref().unwrap_or(&self.local)
    }

    /// Iterates the values held by this entry, local first.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        core::iter::once(&self.local)
            .chain(self.coerced.as_ref())
            .filter(|value| !value.is_unset())
    }

    fn is_vacant(&self) -> bool {
        self.local.is_unset() && self.coerced.is_none()
    }
}

/// Per-object sparse storage for property values.
///
/// # Example
///
/// ```rust
/// use understory_dependency::{EffectiveValueStore, PropertyId, Value};
/// # fn demo(width: PropertyId) {
/// let mut store = EffectiveValueStore::new();
/// store.set_local(width, Value::from(100.0));
/// assert_eq!(store.get_local(width), Some(&Value::from(100.0)));
///
/// store.set_coerced(width, Some(Value::from(50.0)));
/// assert_eq!(store.effective(width), Some(&Value::from(50.0)));
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct EffectiveValueStore {
    /// Entries sorted by [`PropertyId`] for binary search lookup.
    entries: SmallVec<[(PropertyId, EffectiveValueEntry); INLINE_CAPACITY]>,
}

impl EffectiveValueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no property has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns the property IDs that have entries, in handle order.
    pub fn property_ids(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    /// Iterates all entries in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (PropertyId, &EffectiveValueEntry)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Binary search for an entry by property ID.
    #[inline]
    fn find(&self, id: PropertyId) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&id, |(pid, _)| *pid)
    }

    /// Returns the entry for a property.
    #[must_use]
    pub fn entry(&self, id: PropertyId) -> Option<&EffectiveValueEntry> {
        self.find(id).ok().map(|idx| &self.entries[idx].1)
    }

    /// Returns the authored value, if set.
    #[must_use]
    pub fn get_local(&self, id: PropertyId) -> Option<&Value> {
        self.entry(id)
            .map(EffectiveValueEntry::local)
            .filter(|value| !value.is_unset())
    }

    /// Returns the effective stored value, if any.
    #[must_use]
    pub fn effective(&self, id: PropertyId) -> Option<&Value> {
        self.entry(id).map(EffectiveValueEntry::effective)
    }

    /// Replaces the entry for `id` with an authored value and no coercion.
    ///
    /// Returns the previous entry.
    pub fn set_local(&mut self, id: PropertyId, value: Value) -> Option<EffectiveValueEntry> {
        self.replace(id, Some(EffectiveValueEntry::with_local(value)))
    }

    /// Sets or clears the coerced value for `id`, creating or removing the
    /// entry as needed.
    pub fn set_coerced(&mut self, id: PropertyId, coerced: Option<Value>) {
        match self.find(id) {
            Ok(idx) => {
                self.entries[idx].1.coerced = coerced;
                if self.entries[idx].1.is_vacant() {
                    self.entries.remove(idx);
                }
            }
            Err(idx) => {
                if let Some(coerced) = coerced {
                    let entry = EffectiveValueEntry {
                        local: Value::Unset,
                        coerced: Some(coerced),
                    };
                    self.entries.insert(idx, (id, entry));
                }
            }
        }
    }

    /// Puts `entry` in place of whatever is stored for `id`.
    ///
    /// `None` removes the entry. Returns the previous entry.
    pub fn replace(
        &mut self,
        id: PropertyId,
        entry: Option<EffectiveValueEntry>,
    ) -> Option<EffectiveValueEntry> {
        let entry = entry.filter(|entry| !entry.is_vacant());
        match (self.find(id), entry) {
            (Ok(idx), Some(entry)) => Some(core::mem::replace(&mut self.entries[idx].1, entry)),
            (Ok(idx), None) => Some(self.entries.remove(idx).1),
            (Err(idx), Some(entry)) => {
                self.entries.insert(idx, (id, entry));
                None
            }
            (Err(_), None) => None,
        }
    }

    /// Removes the entry for `id`.
    ///
    /// Returns the removed entry.
    pub fn remove(&mut self, id: PropertyId) -> Option<EffectiveValueEntry> {
        self.replace(id, None)
    }
}
