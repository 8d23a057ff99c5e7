//! Binary flag group for cross-thread signalling.
//!
//! A small condition-variable wrapper in the spirit of a FreeRTOS event
//! group: one side sets bits, the other blocks until any of the bits it
//! cares about shows up. Bits are sticky; nothing here clears them.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Thread-safe set of sticky binary flags.
///
/// Safe for a setter running on an event dispatch context and a waiter
/// blocked on [`wait_any`](Self::wait_any) at the same time. Setting a bit
/// that is already set is a no-op.
#[derive(Debug, Default)]
pub struct EventFlags {
    bits: Mutex<u32>,
    wakeup: Condvar,
}

impl EventFlags {
    /// Create a flag group with all bits clear.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the given bits. Immediately visible to any waiter.
    pub fn set(&self, bits: u32) {
        let mut state = self.bits.lock().unwrap();
        *state |= bits;
        self.wakeup.notify_all();
    }

    /// Current bits without blocking.
    pub fn get(&self) -> u32 {
        *self.bits.lock().unwrap()
    }

    /// Block until at least one bit in `mask` is set or `timeout` elapses.
    ///
    /// `None` waits indefinitely; termination is then the setter's problem.
    /// Returns all bits observed at wake time (possibly none of `mask` on
    /// timeout, possibly bits outside `mask`). Bits are not cleared.
    pub fn wait_any(&self, mask: u32, timeout: Option<Duration>) -> u32 {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.bits.lock().unwrap();
        loop {
            if *state & mask != 0 {
                return *state;
            }
            state = match deadline {
                None => self.wakeup.wait(state).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return *state;
                    }
                    self.wakeup.wait_timeout(state, deadline - now).unwrap().0
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const BIT_A: u32 = 1 << 0;
    const BIT_B: u32 = 1 << 1;

    #[test]
    fn test_wait_returns_immediately_when_bit_already_set() {
        let flags = EventFlags::new();
        flags.set(BIT_A);
        let observed = flags.wait_any(BIT_A, Some(Duration::from_secs(1)));
        assert_eq!(observed & BIT_A, BIT_A);
    }

    #[test]
    fn test_wait_times_out_with_nothing_set() {
        let flags = EventFlags::new();
        let observed = flags.wait_any(BIT_A, Some(Duration::from_millis(50)));
        assert_eq!(observed, 0);
    }

    #[test]
    fn test_set_wakes_blocked_waiter() {
        let flags = Arc::new(EventFlags::new());
        let setter = {
            let flags = flags.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                flags.set(BIT_B);
            })
        };
        let observed = flags.wait_any(BIT_A | BIT_B, Some(Duration::from_secs(5)));
        assert_eq!(observed, BIT_B);
        setter.join().unwrap();
    }

    #[test]
    fn test_bits_accumulate_and_are_sticky() {
        let flags = EventFlags::new();
        flags.set(BIT_A);
        flags.set(BIT_B);
        assert_eq!(flags.get(), BIT_A | BIT_B);
        // Waiting does not clear anything.
        flags.wait_any(BIT_A, Some(Duration::from_millis(10)));
        assert_eq!(flags.get(), BIT_A | BIT_B);
    }

    #[test]
    fn test_setting_a_set_bit_is_a_no_op() {
        let flags = EventFlags::new();
        flags.set(BIT_A);
        flags.set(BIT_A);
        assert_eq!(flags.get(), BIT_A);
    }

    #[test]
    fn test_wake_reports_bits_outside_the_mask() {
        let flags = EventFlags::new();
        flags.set(BIT_A | BIT_B);
        let observed = flags.wait_any(BIT_A, Some(Duration::from_secs(1)));
        assert_eq!(observed, BIT_A | BIT_B);
    }
}
