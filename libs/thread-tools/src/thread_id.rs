// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::num::NonZeroUsize;
use core::sync::atomic::{AtomicUsize, Ordering};

use lock_api::GetThreadId;

/// An opaque identifier of a thread, or [`ThreadId::UNDEFINED`].
///
/// Identifiers of real threads are produced by a [`GetThreadId`] implementation and are never
/// zero, so they can never collide with [`ThreadId::UNDEFINED`].
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ThreadId(usize);

impl ThreadId {
    /// The identifier meaning "no thread".
    pub const UNDEFINED: Self = Self(0);

    /// Returns the identifier of the calling thread as reported by `identity`.
    #[inline]
    #[must_use]
    pub fn current<G: GetThreadId>(identity: &G) -> Self {
        Self::from(identity.nonzero_thread_id())
    }

    #[inline]
    #[must_use]
    pub const fn is_undefined(self) -> bool {
        self.0 == 0
    }

    /// Returns the raw value of this identifier, `0` for [`ThreadId::UNDEFINED`].
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    pub(crate) const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }
}

impl From<NonZeroUsize> for ThreadId {
    fn from(id: NonZeroUsize) -> Self {
        Self(id.get())
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            f.write_str("ThreadId(<undefined>)")
        } else {
            write!(f, "ThreadId({:#x})", self.0)
        }
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            f.write_str("<undefined>")
        } else {
            write!(f, "{:#x}", self.0)
        }
    }
}

/// A [`ThreadId`] stored in an atomic so that threads other than the owner may inspect it.
///
/// Writes only ever happen while the raw lock guarding the surrounding primitive is held, which
/// is what orders them; the atomic merely keeps the concurrent reads well-defined.
#[derive(Debug)]
pub(crate) struct AtomicThreadId(AtomicUsize);

impl AtomicThreadId {
    pub(crate) const fn undefined() -> Self {
        Self(AtomicUsize::new(0))
    }

    #[inline]
    pub(crate) fn load(&self) -> ThreadId {
        ThreadId::from_raw(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub(crate) fn store(&self, id: ThreadId) {
        self.0.store(id.as_usize(), Ordering::Relaxed);
    }
}

/// A unique identifier for the calling thread.
///
/// This is an opaque object that uniquely identifies the calling thread. Importantly, the
/// underlying value is *not* human-readable, sequential or even stable across runs.
pub struct LocalThreadId;

// Safety: the address of a thread-local is unique among all live threads and non-zero.
unsafe impl GetThreadId for LocalThreadId {
    const INIT: Self = LocalThreadId;

    fn nonzero_thread_id(&self) -> NonZeroUsize {
        // The variable has to have a non-zero size to guarantee it has a unique address
        // for each thread.
        std::thread_local! {
            static KEY: u8 = 0;
        }
        KEY.with(|key| {
            NonZeroUsize::new(core::ptr::from_ref(key).addr()).expect("thread ID was zero")
        })
    }
}
