// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

use lock_api::RawMutex;

use crate::error::{Error, fail};
use crate::thread_id::AtomicThreadId;
use crate::{DefaultRawMutex, ThreadId};

/// A raw mutex together with the identity of the thread it is held on behalf of.
///
/// The cell either holds a raw mutex (it is *initialized*) or it does not. Every locking
/// operation on an uninitialized cell is a contract violation and panics.
///
/// The owner slot is pure bookkeeping: the cell never reads it itself. The primitive embedding
/// the cell decides what the owner means ([`ReentrantLock`](crate::ReentrantLock) records the
/// thread holding the lock, [`Rendezvous`](crate::Rendezvous) the thread waiting on it).
pub struct MutexCell<R = DefaultRawMutex> {
    raw: Option<R>,
    owner: AtomicThreadId,
}

impl<R: RawMutex> MutexCell<R> {
    /// Creates a new, initialized and unlocked cell.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raw: Some(R::INIT),
            owner: AtomicThreadId::undefined(),
        }
    }

    /// Creates an uninitialized cell. It must be [`init`](Self::init)ialized before use.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            raw: None,
            owner: AtomicThreadId::undefined(),
        }
    }

    /// (Re)initializes the cell with a fresh, unlocked raw mutex and no owner.
    ///
    /// Any raw mutex held previously is released first, whatever its state.
    pub fn init(&mut self) {
        self.reset();
        self.raw = Some(R::INIT);
    }

    /// Releases the raw mutex and clears the owner. Resetting an uninitialized cell does nothing.
    pub fn reset(&mut self) {
        self.raw = None;
        self.owner.store(ThreadId::UNDEFINED);
    }

    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.raw.is_some()
    }

    /// # Panics
    ///
    /// Panics if the cell is not initialized.
    #[inline]
    #[track_caller]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.raw().is_locked()
    }

    /// Attempts to acquire the raw mutex without blocking, returning whether it succeeded.
    ///
    /// # Panics
    ///
    /// Panics if the cell is not initialized.
    #[inline]
    #[track_caller]
    pub fn try_lock(&self) -> bool {
        self.raw().try_lock()
    }

    /// Acquires the raw mutex, blocking the current thread until it is able to do so.
    ///
    /// # Panics
    ///
    /// Panics if the cell is not initialized.
    #[inline]
    #[track_caller]
    pub fn lock(&self) {
        self.raw().lock();
    }

    /// Releases the raw mutex.
    ///
    /// # Safety
    ///
    /// The raw mutex must be locked, and the caller must be entitled to release it on behalf of
    /// whoever locked it.
    ///
    /// If `R::GuardMarker` is [`GuardNoSend`](lock_api::GuardNoSend) the raw mutex must be
    /// released on the same thread that locked it. Only with a
    /// [`GuardSend`](lock_api::GuardSend) marker may another thread release it.
    ///
    /// # Panics
    ///
    /// Panics if the cell is not initialized.
    #[inline]
    #[track_caller]
    pub unsafe fn unlock(&self) {
        // Safety: ensured by caller
        unsafe { self.raw().unlock() }
    }

    /// Releases the raw mutex if it is currently locked, returning whether it was.
    ///
    /// # Safety
    ///
    /// If the raw mutex is locked, the caller must be entitled to release it from the calling
    /// thread (see [`unlock`](Self::unlock)), and no other thread may release it concurrently.
    ///
    /// # Panics
    ///
    /// Panics if the cell is not initialized.
    #[track_caller]
    pub unsafe fn unlock_if_locked(&self) -> bool {
        let raw = self.raw();
        if raw.is_locked() {
            // Safety: the mutex is locked and the caller is entitled to release it
            unsafe { raw.unlock() };
            true
        } else {
            false
        }
    }

    /// Returns the thread recorded as owner, [`ThreadId::UNDEFINED`] if there is none.
    #[inline]
    #[must_use]
    pub fn owner(&self) -> ThreadId {
        self.owner.load()
    }

    #[inline]
    pub(crate) fn set_owner(&self, id: ThreadId) {
        self.owner.store(id);
    }

    #[inline]
    #[track_caller]
    fn raw(&self) -> &R {
        match &self.raw {
            Some(raw) => raw,
            None => fail(Error::Uninitialized),
        }
    }
}

impl<R: RawMutex> Default for MutexCell<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RawMutex> fmt::Debug for MutexCell<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("MutexCell");
        match &self.raw {
            Some(raw) => s.field("locked", &raw.is_locked()),
            None => s.field("locked", &format_args!("<uninitialized>")),
        };
        s.field("owner", &self.owner()).finish()
    }
}
