// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Thread synchronization tools.
//!
//! This crate provides three primitives layered on top of a raw mutex ([`lock_api::RawMutex`])
//! and a thread identity capability ([`lock_api::GetThreadId`]):
//!
//! - [`ReentrantLock`] a mutual exclusion lock that the owning thread may acquire recursively.
//!   It is released once every acquisition has been matched by an unlock.
//! - [`LockGuard`] binds an acquisition of a [`ReentrantLock`] to a scope.
//! - [`Rendezvous`] lets one thread block until another thread explicitly releases it.
//!
//! Misuse (unlocking a lock the caller does not own, waiting on a rendezvous that another
//! thread armed, operating on an uninitialized primitive, ...) is treated as a bug in the
//! caller and panics. Exhausting the recursion counter of a [`ReentrantLock`] is reported as
//! an [`Error`] instead.

mod backoff;
mod cell;
mod error;
mod guard;
mod raw_mutex;
mod reentrant;
mod rendezvous;
#[cfg(test)]
mod test_util;
mod thread_id;

pub use backoff::Backoff;
pub use cell::MutexCell;
pub use error::{Error, ErrorKind};
pub use guard::LockGuard;
pub use raw_mutex::{DefaultRawMutex, RawSpinMutex};
pub use reentrant::ReentrantLock;
pub use rendezvous::Rendezvous;
pub use thread_id::{LocalThreadId, ThreadId};

/// Marker type which indicates that the Guard type for a lock is not `Send`.
#[expect(dead_code, reason = "inner pointer is unused")]
pub(crate) struct GuardNoSend(*mut ());
#[expect(clippy::undocumented_unsafe_blocks, reason = "")]
unsafe impl Sync for GuardNoSend {}
