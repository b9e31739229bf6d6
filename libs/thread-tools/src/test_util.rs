// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::cell::Cell;
use core::num::NonZeroUsize;

use lock_api::GetThreadId;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

use crate::LocalThreadId;

/// The number of threads spawned by tests that hammer a primitive concurrently.
pub(crate) const THREADS: usize = 3;

std::thread_local! {
    static IMPERSONATING: Cell<usize> = const { Cell::new(0) };
}

/// A thread identity that lets a test pose as another thread.
///
/// Outside of [`impersonate`] it reports the same ids as [`LocalThreadId`].
pub(crate) struct ScriptedThreadId;

// Safety: only ever used in single-threaded tests that control which id is reported.
unsafe impl GetThreadId for ScriptedThreadId {
    const INIT: Self = ScriptedThreadId;

    fn nonzero_thread_id(&self) -> NonZeroUsize {
        IMPERSONATING
            .with(|id| NonZeroUsize::new(id.get()))
            .unwrap_or_else(|| LocalThreadId.nonzero_thread_id())
    }
}

/// Runs `f` with [`ScriptedThreadId`] reporting `id` on the current thread.
pub(crate) fn impersonate<R>(id: usize, f: impl FnOnce() -> R) -> R {
    struct Restore(usize);
    impl Drop for Restore {
        fn drop(&mut self) {
            IMPERSONATING.with(|id| id.set(self.0));
        }
    }

    let prev = IMPERSONATING.with(|cell| cell.replace(id));
    let _restore = Restore(prev);
    f()
}

/// Installs a thread-local `tracing` subscriber for the duration of a test.
pub(crate) fn trace_init() -> tracing::subscriber::DefaultGuard {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_ids(true)
        .set_default()
}
