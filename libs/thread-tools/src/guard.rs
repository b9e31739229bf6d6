// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::marker::PhantomData;

use lock_api::{GetThreadId, RawMutex};

use crate::error::{Error, fail};
use crate::{DefaultRawMutex, GuardNoSend, LocalThreadId, ReentrantLock};

/// An RAII implementation of a "scoped lock" of a [`ReentrantLock`].
///
/// The guard acquires the lock when created and releases its acquisition when dropped, which
/// includes unwinding out of a panicking scope. In between, the acquisition can be given up
/// early with [`unlock`](Self::unlock) and taken again with [`lock`](Self::lock).
///
/// A guard accounts for exactly one acquisition. Nesting guards on the same lock from the same
/// thread is fine, each releases its own acquisition.
#[clippy::has_significant_drop]
#[must_use = "if unused the ReentrantLock will immediately unlock"]
pub struct LockGuard<'a, R: RawMutex = DefaultRawMutex, G: GetThreadId = LocalThreadId> {
    lock: &'a ReentrantLock<R, G>,
    locked: bool,
    marker: PhantomData<GuardNoSend>,
}

impl<'a, R: RawMutex, G: GetThreadId> LockGuard<'a, R, G> {
    /// Acquires `lock` and returns a guard holding that acquisition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CounterOverflow`] if the current thread already holds `lock` as often as
    /// it can count.
    ///
    /// # Panics
    ///
    /// Panics if `lock` is not initialized.
    #[track_caller]
    pub fn new(lock: &'a ReentrantLock<R, G>) -> Result<Self, Error> {
        lock.lock()?;

        Ok(Self {
            lock,
            locked: true,
            marker: PhantomData,
        })
    }

    /// Re-acquires the lock after an early [`unlock`](Self::unlock). Does nothing if the guard
    /// already holds it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CounterOverflow`] if the lock cannot count another acquisition. The guard
    /// keeps not holding it in that case.
    #[track_caller]
    pub fn lock(&mut self) -> Result<(), Error> {
        if !self.locked {
            self.lock.lock()?;
            self.locked = true;
        }
        Ok(())
    }

    /// Releases the acquisition held by this guard before the guard goes out of scope.
    ///
    /// # Panics
    ///
    /// Panics if the guard does not currently hold the lock.
    #[track_caller]
    pub fn unlock(&mut self) {
        if !self.locked {
            fail(Error::GuardNotHeld);
        }

        self.lock.unlock();
        self.locked = false;
    }

    /// Releases the acquisition if the guard still holds it.
    pub fn reset(&mut self) {
        if self.locked {
            self.locked = false;
            self.lock.unlock();
        }
    }

    /// Returns `true` if this guard currently holds an acquisition of its lock.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Returns a reference to the lock this guard is bound to.
    #[inline]
    #[must_use]
    pub fn lock_ref(&self) -> &'a ReentrantLock<R, G> {
        self.lock
    }
}

impl<R: RawMutex, G: GetThreadId> Drop for LockGuard<'_, R, G> {
    #[inline]
    fn drop(&mut self) {
        self.reset();
    }
}

impl<R: RawMutex, G: GetThreadId> fmt::Debug for LockGuard<'_, R, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}
