// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

use crate::ThreadId;

/// Errors raised by the primitives in this crate.
///
/// Only [`Error::CounterOverflow`] is ever returned to callers. Every other variant describes
/// misuse of a primitive and is raised as a panic carrying the variant's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The primitive was used before being initialized or after being reset.
    Uninitialized,
    /// A lock that no thread holds was unlocked.
    NotLocked,
    /// A lock was unlocked by a thread other than its owner.
    NotOwner { owner: ThreadId, caller: ThreadId },
    /// A fresh acquisition of the raw lock found another owner already recorded.
    OwnerMismatch { owner: ThreadId },
    /// A thread waited on a rendezvous another thread is already waiting on.
    ForeignWaiter { waiter: ThreadId, caller: ThreadId },
    /// The thread waiting on a rendezvous attempted to unblock it.
    SelfUnblock { waiter: ThreadId },
    /// A reentrant lock was acquired more often than it can count.
    CounterOverflow { max: usize },
    /// A lock guard was unlocked while it did not hold its lock.
    GuardNotHeld,
}

/// The category an [`Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The primitive was used in a way its contract forbids.
    Contract,
    /// A counting range was exhausted.
    Limit,
    /// Misuse detected by a guard wrapper.
    Logic,
}

impl Error {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::CounterOverflow { .. } => ErrorKind::Limit,
            Error::GuardNotHeld => ErrorKind::Logic,
            Error::Uninitialized
            | Error::NotLocked
            | Error::NotOwner { .. }
            | Error::OwnerMismatch { .. }
            | Error::ForeignWaiter { .. }
            | Error::SelfUnblock { .. } => ErrorKind::Contract,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Uninitialized => f.write_str("primitive used while uninitialized"),
            Error::NotLocked => f.write_str("attempted to unlock a lock that is not locked"),
            Error::NotOwner { owner, caller } => write!(
                f,
                "thread {caller} attempted to unlock a lock owned by thread {owner}"
            ),
            Error::OwnerMismatch { owner } => write!(
                f,
                "acquired a lock that is still recorded as owned by thread {owner}"
            ),
            Error::ForeignWaiter { waiter, caller } => write!(
                f,
                "thread {caller} attempted to wait on a rendezvous thread {waiter} is waiting on"
            ),
            Error::SelfUnblock { waiter } => {
                write!(f, "thread {waiter} attempted to unblock its own rendezvous")
            }
            Error::CounterOverflow { max } => {
                write!(f, "reentrant lock acquired more than {max} times")
            }
            Error::GuardNotHeld => f.write_str("attempted to unlock a guard that is not locked"),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Contract => f.pad("contract violation"),
            ErrorKind::Limit => f.pad("resource limit"),
            ErrorKind::Logic => f.pad("logic error"),
        }
    }
}

impl core::error::Error for Error {}

/// Raises `err` as a panic after logging it.
#[cold]
#[track_caller]
pub(crate) fn fail(err: Error) -> ! {
    tracing::error!(kind = %err.kind(), "{err}");
    panic!("{}: {err}", err.kind());
}
