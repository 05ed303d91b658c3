// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thread affinity contract.
//!
//! A mutable object is bound to the context that created it and may only be
//! used from that context. This crate does not implement a dispatcher; it only
//! asks a [`ThreadContext`] "who is calling?" and compares the answer to the
//! owner recorded on the object.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Identity of an owning context.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Creates an owner identity from a raw value.
    ///
    /// Custom [`ThreadContext`] implementations use this to name their
    /// contexts. Values must be unique per context.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnerId").field(&self.0).finish()
    }
}

/// Supplies the identity of the calling context.
///
/// Implementations must be cheap and must not block.
pub trait ThreadContext: Send + Sync + 'static {
    /// Returns the identity of the calling context.
    fn current(&self) -> OwnerId;

    /// Returns `true` if the calling context is `owner`.
    fn is_current(&self, owner: OwnerId) -> bool {
        self.current() == owner
    }
}

/// The default context: one owner per OS thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct CurrentThread;

static NEXT_THREAD: AtomicU64 = AtomicU64::new(1);

std::thread_local! {
    static THREAD_OWNER: OwnerId = OwnerId(NEXT_THREAD.fetch_add(1, Ordering::Relaxed));
}

impl ThreadContext for CurrentThread {
    fn current(&self) -> OwnerId {
        THREAD_OWNER.with(|owner| *owner)
    }
}
