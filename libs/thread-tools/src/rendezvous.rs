// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use lock_api::{GetThreadId, GuardSend, RawMutex};

use crate::error::{Error, fail};
use crate::{DefaultRawMutex, LocalThreadId, LockGuard, MutexCell, ReentrantLock, ThreadId};

/// Blocks a thread until another thread unblocks it.
///
/// A rendezvous is either *unarmed* (nobody waits on it) or *armed* on behalf of exactly one
/// waiting thread. [`wait`](Self::wait) arms it for the calling thread and then blocks until
/// some other thread calls [`unblock`](Self::unblock), after which the rendezvous is unarmed
/// again and can be reused.
///
/// An `unblock` issued while the rendezvous is unarmed has no effect. To not lose an `unblock`
/// that races with the waiter arriving, a rendezvous created with [`new`](Self::new) starts out
/// armed on behalf of the creating thread: an `unblock` from another thread is then remembered
/// until the creator calls `wait`.
///
/// # Misuse
///
/// Waiting on a rendezvous armed by another thread and unblocking a rendezvous the calling
/// thread is armed on both panic. The `*_ignoring_target` variants skip these identity checks.
///
/// # Implementation
///
/// Two locks are involved. `gate` is held briefly while a call inspects or changes the state.
/// `signal` is what the waiter actually blocks on: arming locks it once, and the waiter then
/// locks it a second time, which only succeeds once `unblock` released the first acquisition.
/// Arming and blocking are separate steps so that `unblock` can tell "nobody is waiting yet"
/// from "somebody is waiting" under `gate`, without `gate` being held while the waiter sleeps.
///
/// `unblock` releases `signal` on a different thread than the one that locked it, so the raw
/// mutex must allow that, which `lock_api` expresses through a [`GuardSend`] guard marker.
pub struct Rendezvous<
    R: RawMutex<GuardMarker = GuardSend> = DefaultRawMutex,
    G = LocalThreadId,
> {
    gate: ReentrantLock<R, G>,
    // the owner of `signal` is the waiting thread
    signal: MutexCell<R>,
    // set by `unblock` once it released `signal`, cleared by the waiter after waking
    released: AtomicBool,
}

impl<R: RawMutex<GuardMarker = GuardSend>, G: GetThreadId> Rendezvous<R, G> {
    /// Creates a new rendezvous armed on behalf of the calling thread.
    #[must_use]
    pub fn new() -> Self {
        let this = Self::new_unarmed();
        this.arm(this.gate.current_thread());
        this
    }

    /// Creates a new, unarmed rendezvous.
    #[must_use]
    pub const fn new_unarmed() -> Self {
        Self {
            gate: ReentrantLock::new(),
            signal: MutexCell::new(),
            released: AtomicBool::new(false),
        }
    }

    /// Creates an uninitialized rendezvous. It must be [`init`](Self::init)ialized before use.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            gate: ReentrantLock::empty(),
            signal: MutexCell::empty(),
            released: AtomicBool::new(false),
        }
    }

    /// (Re)initializes the rendezvous.
    ///
    /// Unless `skip_prefetching` is set, the rendezvous is armed on behalf of the calling thread,
    /// exactly as if it was created with [`new`](Self::new).
    pub fn init(&mut self, skip_prefetching: bool) {
        self.gate.init();
        self.signal.init();
        *self.released.get_mut() = false;

        if !skip_prefetching {
            self.arm(self.gate.current_thread());
        }
    }

    /// Tears the rendezvous down. Resetting an uninitialized rendezvous does nothing.
    pub fn reset(&mut self) {
        self.gate.reset();
        self.signal.reset();
        *self.released.get_mut() = false;
    }

    /// Blocks the calling thread until another thread calls [`unblock`](Self::unblock).
    ///
    /// Arms the rendezvous first if it is unarmed. If the rendezvous was already released by an
    /// `unblock` that arrived before this call, returns right away.
    ///
    /// # Panics
    ///
    /// Panics if the rendezvous is not initialized, or if it is armed on behalf of another thread.
    #[track_caller]
    pub fn wait(&self) {
        self.wait_inner(false);
    }

    /// Like [`wait`](Self::wait), but does not check that the rendezvous is armed on behalf of the
    /// calling thread.
    ///
    /// # Panics
    ///
    /// Panics if the rendezvous is not initialized.
    #[track_caller]
    pub fn wait_ignoring_target(&self) {
        self.wait_inner(true);
    }

    /// Releases the thread waiting on this rendezvous. Does nothing if the rendezvous is unarmed
    /// or was already released.
    ///
    /// # Panics
    ///
    /// Panics if the rendezvous is not initialized, or if it is armed on behalf of the calling
    /// thread.
    #[track_caller]
    pub fn unblock(&self) {
        self.unblock_inner(false);
    }

    /// Like [`unblock`](Self::unblock), but allows the thread the rendezvous is armed for to
    /// release it itself.
    ///
    /// # Panics
    ///
    /// Panics if the rendezvous is not initialized.
    #[track_caller]
    pub fn unblock_ignoring_target(&self) {
        self.unblock_inner(true);
    }

    /// Returns `true` if a thread is registered as waiting and has not been released yet.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        !self.signal.owner().is_undefined() && !self.released.load(Ordering::Relaxed)
    }

    /// Returns the thread the rendezvous is armed for, if any.
    #[must_use]
    pub fn waiter(&self) -> Option<ThreadId> {
        let waiter = self.signal.owner();
        (!waiter.is_undefined()).then_some(waiter)
    }

    #[track_caller]
    fn wait_inner(&self, ignore_target: bool) {
        let me = self.gate.current_thread();
        let mut gate = self.lock_gate();

        let waiter = self.signal.owner();
        if waiter.is_undefined() {
            self.arm(me);
        } else if !ignore_target && waiter != me {
            fail(Error::ForeignWaiter { waiter, caller: me });
        }

        gate.unlock();

        tracing::trace!(waiter = %me, "waiting on rendezvous...");
        // the first acquisition belongs to the arming, so this blocks until `unblock`
        self.signal.lock();

        if let Err(err) = gate.lock() {
            fail(err);
        }

        self.signal.set_owner(ThreadId::UNDEFINED);
        self.released.store(false, Ordering::Relaxed);
        // Safety: acquired by this thread above
        unsafe { self.signal.unlock() };

        tracing::trace!(waiter = %me, "rendezvous released");
    }

    #[track_caller]
    fn unblock_inner(&self, ignore_target: bool) {
        let me = self.gate.current_thread();
        let _gate = self.lock_gate();

        let waiter = self.signal.owner();
        if !ignore_target && waiter == me {
            fail(Error::SelfUnblock { waiter });
        }

        if waiter.is_undefined() || self.released.load(Ordering::Relaxed) {
            tracing::trace!(%waiter, "nothing to unblock");
            return;
        }

        self.released.store(true, Ordering::Relaxed);
        tracing::trace!(%waiter, "unblocking rendezvous");
        // Safety: an armed rendezvous that was not released yet still holds the acquisition taken
        // by `arm`, and `gate` keeps anyone else from releasing it concurrently. That acquisition
        // was made by the waiter, which `R: RawMutex<GuardMarker = GuardSend>` permits.
        unsafe { self.signal.unlock() };
    }

    /// Locks `signal` on behalf of `waiter`. Must only be called while unarmed.
    #[track_caller]
    fn arm(&self, waiter: ThreadId) {
        // unarmed means unlocked, so this never blocks
        self.signal.lock();
        self.signal.set_owner(waiter);
        tracing::trace!(%waiter, "rendezvous armed");
    }

    #[track_caller]
    fn lock_gate(&self) -> LockGuard<'_, R, G> {
        // `gate` is never held across calls, so it never nests deep enough to overflow
        match self.gate.guard() {
            Ok(guard) => guard,
            Err(err) => fail(err),
        }
    }
}

impl<R: RawMutex<GuardMarker = GuardSend>, G: GetThreadId> Default for Rendezvous<R, G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RawMutex<GuardMarker = GuardSend>, G: GetThreadId> fmt::Debug for Rendezvous<R, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rendezvous")
            .field("waiter", &self.signal.owner())
            .field("released", &self.released.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
