// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::hint;
use std::thread;

/// An [exponential backoff] for lock acquisition loops.
///
/// The first rounds busy-wait with an exponentially growing number of [spin loop hints]. Once
/// the configured maximum exponent is reached, each further round yields the time slice to
/// the OS scheduler instead. A thread blocked on a [`Rendezvous`](crate::Rendezvous) may sit
/// in this loop for an arbitrarily long time, so burning a core forever is not an option.
///
/// [exponential backoff]: https://en.wikipedia.org/wiki/Exponential_backoff
/// [spin loop hints]: hint::spin_loop
#[derive(Debug, Copy, Clone)]
pub struct Backoff {
    exp: u8,
    max: u8,
}

// === impl Backoff ===

impl Backoff {
    /// The default maximum exponent (2^6).
    pub const DEFAULT_MAX_EXPONENT: u8 = 6;

    /// Returns a new backoff with the maximum exponent set to [`Self::DEFAULT_MAX_EXPONENT`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            exp: 0,
            max: Self::DEFAULT_MAX_EXPONENT,
        }
    }

    /// Returns a new backoff with the provided max exponent.
    ///
    /// # Panics
    ///
    /// Panics if the `max` exponent is larger than [`Self::DEFAULT_MAX_EXPONENT`].
    #[must_use]
    pub fn with_max_exponent(max: u8) -> Self {
        assert!(max <= Self::DEFAULT_MAX_EXPONENT);
        Self { exp: 0, max }
    }

    /// Backs off once.
    ///
    /// Issues `2^exp` spin loop hints while below the maximum exponent, incrementing the
    /// exponent afterwards. At the maximum exponent the current thread yields instead.
    #[inline]
    pub fn snooze(&mut self) {
        if self.is_saturated() {
            thread::yield_now();
            return;
        }

        for _ in 0..1_u32 << self.exp {
            hint::spin_loop();
        }

        self.exp += 1;
    }

    /// Returns `true` once the backoff has stopped spinning and started yielding.
    #[inline]
    #[must_use]
    pub fn is_saturated(self) -> bool {
        self.exp >= self.max
    }

    #[inline]
    pub fn reset(&mut self) {
        self.exp = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
