// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Memory ordering and register polling helpers.
//!
//! The DMA engines read descriptors and socket registers behind the CPU's
//! back. [`barrier`] must follow every store that such an engine consumes,
//! and precede every load of a value an engine may just have produced.
//!
//! Polling comes in two flavours. [`wait_for_condition`] never gives up and
//! is reserved for socket enable / disable, where the hardware guarantees
//! completion. Everything else goes through [`wait_for_condition_timeout`].

use crate::ErrorCode;

/// Make all prior stores visible to the DMA fabric.
///
/// ARM926EJ-S: drain the write buffer through CP15.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[inline(always)]
pub fn barrier() {
    use core::arch::asm;
    // SAFETY: c7, c10, 4 only drains the write buffer; it has no other side
    // effects on registers or memory.
    unsafe {
        asm!("mcr p15, 0, {0}, c7, c10, 4", in(reg) 0u32, options(nostack, preserves_flags));
    }
}

/// Make all prior stores visible to the DMA fabric (host build).
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn barrier() {
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

/// How long a bounded poll may run, in poll-interval ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeout {
    /// Check the condition once and fail immediately if it does not hold.
    NoWait,
    /// Check up to `n + 1` times, waiting one tick between checks.
    Ticks(u32),
    /// Never give up.
    Forever,
}

impl Timeout {
    /// Raw tick value meaning "do not wait".
    pub const NO_WAIT: u32 = 0;
    /// Raw tick value meaning "wait forever".
    pub const WAIT_FOREVER: u32 = 0xFFFF_FFFF;
}

impl From<u32> for Timeout {
    fn from(ticks: u32) -> Timeout {
        match ticks {
            Timeout::NO_WAIT => Timeout::NoWait,
            Timeout::WAIT_FOREVER => Timeout::Forever,
            n => Timeout::Ticks(n),
        }
    }
}

/// Source of the fixed poll interval used by bounded waits.
pub trait PollDelay {
    /// Block (or spin) for one poll interval.
    fn delay_tick(&self);
}

/// Spin until `done` returns true.
///
/// There is intentionally no way out: this is only used where the hardware
/// contract guarantees the condition is eventually met.
pub fn wait_for_condition<F: FnMut() -> bool>(mut done: F) {
    while !done() {
        core::hint::spin_loop();
    }
}

/// Poll `done` once per tick until it returns true or `timeout` expires.
///
/// The condition is always checked at least once, so `Timeout::NoWait`
/// succeeds if the condition already holds.
pub fn wait_for_condition_timeout<F: FnMut() -> bool>(
    timeout: Timeout,
    delay: &dyn PollDelay,
    mut done: F,
) -> Result<(), ErrorCode> {
    let mut remaining = match timeout {
        Timeout::NoWait => 0,
        Timeout::Ticks(n) => n,
        Timeout::Forever => 0,
    };

    loop {
        if done() {
            return Ok(());
        }
        match timeout {
            Timeout::Forever => {}
            _ if remaining == 0 => return Err(ErrorCode::TIMEOUT),
            _ => remaining -= 1,
        }
        delay.delay_tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct CountingDelay {
        ticks: Cell<u32>,
    }

    impl PollDelay for CountingDelay {
        fn delay_tick(&self) {
            self.ticks.set(self.ticks.get() + 1);
        }
    }

    #[test]
    fn raw_sentinels_map_to_variants() {
        assert_eq!(Timeout::from(0), Timeout::NoWait);
        assert_eq!(Timeout::from(0xFFFF_FFFF), Timeout::Forever);
        assert_eq!(Timeout::from(25), Timeout::Ticks(25));
    }

    #[test]
    fn no_wait_checks_once() {
        let delay = CountingDelay { ticks: Cell::new(0) };
        assert_eq!(
            wait_for_condition_timeout(Timeout::NoWait, &delay, || false),
            Err(ErrorCode::TIMEOUT)
        );
        assert_eq!(delay.ticks.get(), 0);
        assert_eq!(
            wait_for_condition_timeout(Timeout::NoWait, &delay, || true),
            Ok(())
        );
    }

    #[test]
    fn ticks_bound_the_number_of_delays() {
        let delay = CountingDelay { ticks: Cell::new(0) };
        assert_eq!(
            wait_for_condition_timeout(Timeout::Ticks(3), &delay, || false),
            Err(ErrorCode::TIMEOUT)
        );
        assert_eq!(delay.ticks.get(), 3);
    }

    #[test]
    fn condition_met_before_expiry() {
        let delay = CountingDelay { ticks: Cell::new(0) };
        let polls = Cell::new(0);
        let result = wait_for_condition_timeout(Timeout::Ticks(10), &delay, || {
            polls.set(polls.get() + 1);
            polls.get() == 4
        });
        assert_eq!(result, Ok(()));
        assert_eq!(delay.ticks.get(), 3);
    }

    #[test]
    fn forever_keeps_polling() {
        let delay = CountingDelay { ticks: Cell::new(0) };
        let polls = Cell::new(0);
        let result = wait_for_condition_timeout(Timeout::Forever, &delay, || {
            polls.set(polls.get() + 1);
            polls.get() > 1000
        });
        assert_eq!(result, Ok(()));
        assert_eq!(delay.ticks.get(), 1000);
    }

    #[test]
    fn unbounded_wait_returns_once_true() {
        let polls = Cell::new(0);
        wait_for_condition(|| {
            polls.set(polls.get() + 1);
            polls.get() == 5
        });
        assert_eq!(polls.get(), 5);
    }
}
