// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::num::NonZeroUsize;
use core::sync::atomic::{AtomicUsize, Ordering};

use lock_api::{GetThreadId, RawMutex};

use crate::error::{Error, fail};
use crate::{DefaultRawMutex, LocalThreadId, LockGuard, MutexCell, ThreadId};

/// A mutual exclusion lock which can be recursively locked by a single thread.
///
/// The first [`lock`](Self::lock) by a thread blocks until the underlying raw mutex can be
/// acquired; every further `lock` by the same thread only bumps an acquisition counter. The raw
/// mutex is released once the owning thread has called [`unlock`](Self::unlock) as many times as
/// it called `lock`.
///
/// Unlike [`lock_api::ReentrantMutex`] this lock protects no data and hands out no guard by
/// itself. It is the bare primitive, and [`LockGuard`] is the scoped way to use it.
///
/// # Misuse
///
/// Unlocking from a thread that does not own the lock panics, and so does any operation on a
/// lock that is not initialized. Acquiring the lock more than [`max_depth`](Self::max_depth)
/// times returns [`Error::CounterOverflow`].
pub struct ReentrantLock<R = DefaultRawMutex, G = LocalThreadId> {
    core: MutexCell<R>,
    count: AtomicUsize,
    max_depth: NonZeroUsize,
    identity: G,
}

impl<R: RawMutex, G: GetThreadId> ReentrantLock<R, G> {
    /// Creates a new, unlocked reentrant lock that may be acquired up to `usize::MAX` times.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_max_depth(NonZeroUsize::MAX)
    }

    /// Creates a new, unlocked reentrant lock that may be acquired up to `max_depth` times.
    #[must_use]
    pub const fn with_max_depth(max_depth: NonZeroUsize) -> Self {
        Self {
            core: MutexCell::new(),
            count: AtomicUsize::new(0),
            max_depth,
            identity: G::INIT,
        }
    }

    /// Creates an uninitialized lock. It must be [`init`](Self::init)ialized before use.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            core: MutexCell::empty(),
            count: AtomicUsize::new(0),
            max_depth: NonZeroUsize::MAX,
            identity: G::INIT,
        }
    }

    /// (Re)initializes the lock, leaving it unlocked and unowned.
    pub fn init(&mut self) {
        self.core.init();
        *self.count.get_mut() = 0;
    }

    /// Tears the lock down. Resetting an uninitialized lock does nothing.
    pub fn reset(&mut self) {
        self.core.reset();
        *self.count.get_mut() = 0;
    }

    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.core.is_initialized()
    }

    /// Acquires the lock, blocking the current thread until it is able to do so.
    ///
    /// If the lock is already held by the current thread this only increments the acquisition
    /// count and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CounterOverflow`] if the current thread already holds the lock
    /// [`max_depth`](Self::max_depth) times. The lock is left untouched in that case.
    ///
    /// # Panics
    ///
    /// Panics if the lock is not initialized.
    #[track_caller]
    pub fn lock(&self) -> Result<(), Error> {
        let me = self.current_thread();

        if self.core.owner() == me {
            return self.reenter();
        }

        self.core.lock();
        self.acquired(me);
        Ok(())
    }

    /// Attempts to acquire the lock without blocking.
    ///
    /// Returns `Ok(true)` if the lock is now held by the current thread and `Ok(false)` if it is
    /// held by another thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CounterOverflow`] if the current thread already holds the lock
    /// [`max_depth`](Self::max_depth) times.
    ///
    /// # Panics
    ///
    /// Panics if the lock is not initialized.
    #[track_caller]
    pub fn try_lock(&self) -> Result<bool, Error> {
        let me = self.current_thread();

        if self.core.owner() == me {
            return self.reenter().map(|()| true);
        }

        if self.core.try_lock() {
            self.acquired(me);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Releases one acquisition of the lock, releasing the lock entirely once every acquisition
    /// has been matched.
    ///
    /// # Panics
    ///
    /// Panics if the lock is not initialized or if the current thread does not own it.
    #[track_caller]
    pub fn unlock(&self) {
        if !self.core.is_initialized() {
            fail(Error::Uninitialized);
        }

        let me = self.current_thread();
        let owner = self.core.owner();
        if owner.is_undefined() {
            fail(Error::NotLocked);
        } else if owner != me {
            fail(Error::NotOwner { owner, caller: me });
        }

        let count = self.count.load(Ordering::Relaxed) - 1;
        self.count.store(count, Ordering::Relaxed);

        if count == 0 {
            self.core.set_owner(ThreadId::UNDEFINED);
            tracing::trace!(owner = %me, "reentrant lock released");
            // Safety: the current thread is the recorded owner, which is only ever the case
            // while it holds the raw mutex.
            unsafe { self.core.unlock() };
        }
    }

    /// Returns `true` if any thread holds the lock.
    ///
    /// # Panics
    ///
    /// Panics if the lock is not initialized.
    #[inline]
    #[track_caller]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.core.is_locked()
    }

    #[inline]
    #[must_use]
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.core.owner() == self.current_thread()
    }

    /// Returns the thread holding the lock, [`ThreadId::UNDEFINED`] if it is not held.
    #[inline]
    #[must_use]
    pub fn owner(&self) -> ThreadId {
        self.core.owner()
    }

    /// Returns how many times the owning thread currently holds the lock.
    ///
    /// Only meaningful when called by the owning thread.
    #[inline]
    #[must_use]
    pub fn lock_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    #[must_use]
    pub fn max_depth(&self) -> NonZeroUsize {
        self.max_depth
    }

    /// Acquires the lock and returns a guard releasing it when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CounterOverflow`] under the same conditions as [`lock`](Self::lock).
    ///
    /// # Panics
    ///
    /// Panics if the lock is not initialized.
    #[track_caller]
    pub fn guard(&self) -> Result<LockGuard<'_, R, G>, Error> {
        LockGuard::new(self)
    }

    #[inline]
    pub(crate) fn current_thread(&self) -> ThreadId {
        ThreadId::current(&self.identity)
    }

    fn reenter(&self) -> Result<(), Error> {
        let count = self.count.load(Ordering::Relaxed);
        if count == self.max_depth.get() {
            tracing::trace!(count, "reentrant lock acquisition limit reached");
            return Err(Error::CounterOverflow { max: count });
        }
        self.count.store(count + 1, Ordering::Relaxed);
        Ok(())
    }

    #[track_caller]
    fn acquired(&self, me: ThreadId) {
        let owner = self.core.owner();
        if !owner.is_undefined() {
            fail(Error::OwnerMismatch { owner });
        }

        self.core.set_owner(me);
        debug_assert_eq!(self.count.load(Ordering::Relaxed), 0);
        self.count.store(1, Ordering::Relaxed);
        tracing::trace!(owner = %me, "reentrant lock acquired");
    }
}

impl<R: RawMutex, G: GetThreadId> Default for ReentrantLock<R, G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RawMutex, G: GetThreadId> fmt::Debug for ReentrantLock<R, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantLock")
            .field("core", &self.core)
            .field("count", &self.count.load(Ordering::Relaxed))
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::mpsc;
    use std::time::Duration;

    use static_assertions::assert_impl_all;

    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    use super::*;
    use crate::test_util::{ScriptedThreadId, THREADS, impersonate, trace_init};
    use crate::{ErrorKind, RawSpinMutex};

    assert_impl_all!(ReentrantLock: Send, Sync);
    assert_impl_all!(ReentrantLock<RawSpinMutex>: Send, Sync);

    type ScriptedLock = ReentrantLock<DefaultRawMutex, ScriptedThreadId>;

    proptest::proptest! {
        #[test]
        fn matched_lock_unlock_releases(depth in 1_usize..64) {
            let lock: ReentrantLock = ReentrantLock::new();

            for i in 1..=depth {
                lock.lock().unwrap();
                proptest::prop_assert!(lock.is_locked());
                proptest::prop_assert_eq!(lock.lock_count(), i);
            }
            for i in (0..depth).rev() {
                lock.unlock();
                proptest::prop_assert_eq!(lock.lock_count(), i);
                proptest::prop_assert_eq!(lock.is_locked(), i > 0);
            }

            proptest::prop_assert!(!lock.is_locked());
            proptest::prop_assert!(lock.owner().is_undefined());
        }

        #[test]
        fn one_unlock_short_stays_owned(depth in 1_usize..64) {
            let lock: ReentrantLock = ReentrantLock::new();

            for _ in 0..depth {
                lock.lock().unwrap();
            }
            for _ in 0..depth - 1 {
                lock.unlock();
            }

            proptest::prop_assert!(lock.is_locked());
            proptest::prop_assert!(lock.is_owned_by_current_thread());
            proptest::prop_assert_eq!(lock.lock_count(), 1);

            lock.unlock();
            proptest::prop_assert!(!lock.is_locked());
        }
    }

    #[test]
    fn try_lock_reenters() {
        let lock: ReentrantLock = ReentrantLock::new();
        assert_eq!(lock.try_lock(), Ok(true));
        assert_eq!(lock.try_lock(), Ok(true));
        assert_eq!(lock.lock_count(), 2);
        lock.unlock();
        lock.unlock();
        assert!(!lock.is_locked());
    }

    #[test]
    fn try_lock_fails_while_held_elsewhere() {
        let lock: ReentrantLock = ReentrantLock::new();
        lock.lock().unwrap();

        thread::scope(|s| {
            s.spawn(|| {
                assert_eq!(lock.try_lock(), Ok(false));
                assert!(!lock.is_owned_by_current_thread());
            });
        });

        lock.unlock();
        thread::scope(|s| {
            s.spawn(|| {
                assert_eq!(lock.try_lock(), Ok(true));
                lock.unlock();
            });
        });
    }

    #[test]
    fn counter_overflow() {
        let lock: ReentrantLock = ReentrantLock::with_max_depth(NonZeroUsize::new(3).unwrap());
        for _ in 0..3 {
            lock.lock().unwrap();
        }

        let err = lock.lock().unwrap_err();
        assert_eq!(err, Error::CounterOverflow { max: 3 });
        assert_eq!(err.kind(), ErrorKind::Limit);
        assert_eq!(lock.try_lock(), Err(Error::CounterOverflow { max: 3 }));
        assert_eq!(lock.lock_count(), 3);

        for _ in 0..3 {
            lock.unlock();
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn max_depth_one_is_not_reentrant() {
        let lock: ReentrantLock = ReentrantLock::with_max_depth(NonZeroUsize::MIN);
        lock.lock().unwrap();
        assert!(lock.lock().is_err());
        lock.unlock();
        assert!(!lock.is_locked());
    }

    #[test]
    #[should_panic(expected = "attempted to unlock a lock that is not locked")]
    fn unlock_unowned() {
        let lock: ReentrantLock = ReentrantLock::new();
        lock.unlock();
    }

    #[test]
    #[should_panic(expected = "contract violation: thread 0x7 attempted to unlock a lock owned by")]
    fn unlock_foreign() {
        let _trace = trace_init();
        let lock = ScriptedLock::new();
        lock.lock().unwrap();
        impersonate(7, || lock.unlock());
    }

    #[test]
    fn foreign_unlock_leaves_counter_alone() {
        let lock = ScriptedLock::new();
        impersonate(3, || {
            lock.lock().unwrap();
            lock.lock().unwrap();
        });

        let res = catch_unwind(AssertUnwindSafe(|| impersonate(4, || lock.unlock())));
        assert!(res.is_err());
        let res = catch_unwind(AssertUnwindSafe(|| lock.unlock()));
        assert!(res.is_err());

        assert_eq!(lock.lock_count(), 2);
        assert_eq!(lock.owner().as_usize(), 3);
        assert!(lock.is_locked());

        impersonate(3, || {
            lock.unlock();
            lock.unlock();
        });
        assert!(!lock.is_locked());
    }

    #[test]
    #[should_panic(expected = "primitive used while uninitialized")]
    fn lock_uninitialized() {
        let lock: ReentrantLock = ReentrantLock::empty();
        let _ = lock.lock();
    }

    #[test]
    #[should_panic(expected = "primitive used while uninitialized")]
    fn unlock_after_reset() {
        let mut lock: ReentrantLock = ReentrantLock::new();
        lock.reset();
        lock.unlock();
    }

    #[test]
    fn init_after_reset() {
        let mut lock: ReentrantLock = ReentrantLock::empty();
        assert!(!lock.is_initialized());
        lock.init();
        lock.lock().unwrap();
        lock.reset();
        lock.reset();
        lock.init();
        assert!(!lock.is_locked());
        assert_eq!(lock.lock_count(), 0);
        lock.lock().unwrap();
        lock.unlock();
    }

    #[test]
    fn contended_lock_blocks_until_final_unlock() {
        let _trace = trace_init();

        let lock: Arc<ReentrantLock> = Arc::new(ReentrantLock::new());
        let acquired = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        lock.lock().unwrap();
        lock.lock().unwrap();

        let t = thread::spawn({
            let lock = lock.clone();
            let acquired = acquired.clone();
            move || {
                tx.send(()).unwrap();
                lock.lock().unwrap();
                acquired.store(true, Ordering::Release);
                assert!(lock.is_owned_by_current_thread());
                assert_eq!(lock.lock_count(), 1);
                lock.unlock();
            }
        });

        rx.recv().unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::Acquire));

        lock.unlock();
        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::Acquire));

        lock.unlock();
        t.join().unwrap();
        assert!(acquired.load(Ordering::Acquire));
        assert!(!lock.is_locked());
    }

    #[test]
    fn concurrent_nested_increments() {
        lazy_static::lazy_static! {
            static ref LOCK: ReentrantLock<RawSpinMutex> = ReentrantLock::new();
            static ref INSIDE: AtomicBool = AtomicBool::new(false);
        }

        let threads: Vec<_> = (0..THREADS)
            .map(|_| {
                thread::spawn(|| {
                    for _ in 0..1_000 {
                        LOCK.lock().unwrap();
                        assert!(!INSIDE.swap(true, Ordering::AcqRel));
                        LOCK.lock().unwrap();
                        assert!(LOCK.is_owned_by_current_thread());
                        LOCK.unlock();
                        INSIDE.store(false, Ordering::Release);
                        LOCK.unlock();
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }
        assert!(!LOCK.is_locked());
    }
}
