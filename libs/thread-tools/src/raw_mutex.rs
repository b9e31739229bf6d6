// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::Backoff;

cfg_if::cfg_if! {
    if #[cfg(feature = "parking_lot")] {
        /// The raw mutex used by the primitives in this crate unless another one is requested.
        ///
        /// This is `parking_lot`'s raw mutex, which parks contending threads in the OS.
        pub type DefaultRawMutex = parking_lot::RawMutex;
    } else {
        /// The raw mutex used by the primitives in this crate unless another one is requested.
        ///
        /// Without the `parking_lot` feature this is [`RawSpinMutex`].
        pub type DefaultRawMutex = RawSpinMutex;
    }
}

/// A raw mutex that spins with exponential backoff, then yields to the scheduler.
///
/// Unlike a mutex guarded by an RAII type, a [`RawSpinMutex`] carries no notion of which thread
/// locked it: any thread may release it. [`Rendezvous`](crate::Rendezvous) relies on this to
/// let one thread release a lock another thread is blocked on.
pub struct RawSpinMutex {
    lock: AtomicBool,
}

impl RawSpinMutex {
    /// Creates a new, unlocked raw mutex.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lock: AtomicBool::new(false),
        }
    }
}

impl Default for RawSpinMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RawSpinMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSpinMutex")
            .field("locked", &self.lock.load(Ordering::Relaxed))
            .finish()
    }
}

// Safety: `lock` only returns once the flag was flipped from `false` to `true` with acquire
// ordering by this call, so at most one context holds the lock at a time.
unsafe impl lock_api::RawMutex for RawSpinMutex {
    const INIT: Self = Self::new();

    type GuardMarker = lock_api::GuardSend;

    fn lock(&self) {
        let mut boff = Backoff::default();
        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.is_locked() {
                boff.snooze();
            }
        }
    }

    fn try_lock(&self) -> bool {
        self.lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        self.lock.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.lock.load(Ordering::Relaxed)
    }
}
