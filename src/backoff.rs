//! Wait strategy for the per-slot spin loops.

use std::hint::spin_loop;

use crate::sync::yield_now;

/// Doublings of the busy-spin burst before falling back to yielding.
const SPIN_LIMIT: u32 = 6;

/// Escalating backoff: spin `2^step` times, then yield the time slice.
///
/// Under loom every step yields, since a busy spin never lets the model
/// scheduler run the thread we are waiting on.
#[derive(Debug, Default)]
pub(crate) struct Backoff {
    step: u32,
}

impl Backoff {
    pub(crate) const fn new() -> Self {
        Backoff { step: 0 }
    }

    #[inline]
    pub(crate) fn snooze(&mut self) {
        if cfg!(not(loom)) && self.step <= SPIN_LIMIT {
            for _ in 0..1u32 << self.step {
                spin_loop();
            }
            self.step += 1;
        } else {
            yield_now();
        }
    }

    /// Short spin for a lost compare-and-swap race; never yields.
    #[inline]
    pub(crate) fn spin(&mut self) {
        if cfg!(loom) {
            yield_now();
            return;
        }
        for _ in 0..1u32 << self.step.min(SPIN_LIMIT) {
            spin_loop();
        }
        if self.step <= SPIN_LIMIT {
            self.step += 1;
        }
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn snooze_escalates_then_saturates() {
        let mut backoff = Backoff::new();
        for _ in 0..=SPIN_LIMIT {
            backoff.snooze();
        }
        assert_eq!(backoff.step, SPIN_LIMIT + 1);

        backoff.snooze();
        backoff.snooze();
        assert_eq!(backoff.step, SPIN_LIMIT + 1);
    }

    #[test]
    fn spin_caps_step() {
        let mut backoff = Backoff::new();
        for _ in 0..32 {
            backoff.spin();
        }
        assert_eq!(backoff.step, SPIN_LIMIT + 1);
    }
}
