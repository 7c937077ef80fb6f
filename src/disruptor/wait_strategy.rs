//! Wait Strategy Implementation
//!
//! Wait strategies determine how a consumer waits for a sequence to become
//! available. Each one trades latency against CPU usage:
//!
//! | strategy   | latency  | cpu      |
//! |------------|----------|----------|
//! | BusySpin   | lowest   | one core |
//! | Yielding   | low      | high     |
//! | Sleeping   | moderate | low      |
//! | Blocking   | highest  | lowest   |

use crate::disruptor::{DisruptorError, Result, Sequence};
use crossbeam_utils::Backoff;
use parking_lot::{Condvar, Mutex};
use std::hint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Strategy for waiting for a sequence to become available
pub trait WaitStrategy: Send + Sync + std::fmt::Debug {
    /// Wait for the given sequence to become available
    ///
    /// Returns once both the cursor and every dependent sequence have reached
    /// `sequence`. The returned value is the minimum over all of them and is
    /// never lower than `sequence`.
    ///
    /// # Arguments
    /// * `sequence` - The sequence to wait for
    /// * `cursor` - The producer cursor
    /// * `dependent_sequences` - Upstream sequences this consumer must not overtake
    /// * `alerted` - Cancellation flag owned by the calling barrier
    ///
    /// # Errors
    /// Returns `DisruptorError::Alert` if `alerted` is raised while waiting
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        alerted: &AtomicBool,
    ) -> Result<i64>;

    /// Wake up any threads blocked in [`WaitStrategy::wait_for`]
    ///
    /// Called after every publish and on alert.
    fn signal_all_when_blocking(&self);
}

#[inline]
fn available_sequence(cursor: &Sequence, dependent_sequences: &[Arc<Sequence>]) -> i64 {
    Sequence::get_minimum_sequence(dependent_sequences, cursor.get())
}

#[inline]
fn check_alert(alerted: &AtomicBool) -> Result<()> {
    if alerted.load(Ordering::Acquire) {
        Err(DisruptorError::Alert)
    } else {
        Ok(())
    }
}

/// Busy-spin wait strategy
///
/// Re-reads the sequences in a tight loop. Lowest latency, but occupies a full
/// core while waiting.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        alerted: &AtomicBool,
    ) -> Result<i64> {
        loop {
            check_alert(alerted)?;
            let available = available_sequence(cursor, dependent_sequences);
            if available >= sequence {
                return Ok(available);
            }
            hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Yielding wait strategy
///
/// Spins for a fixed number of attempts, then yields the thread to the scheduler
/// on every further attempt.
#[derive(Debug, Clone, Copy)]
pub struct YieldingWaitStrategy {
    spin_tries: u32,
}

impl YieldingWaitStrategy {
    pub const DEFAULT_SPIN_TRIES: u32 = 100;

    pub fn new() -> Self {
        Self::with_spin_tries(Self::DEFAULT_SPIN_TRIES)
    }

    /// Create a yielding strategy that spins `spin_tries` times before yielding
    pub fn with_spin_tries(spin_tries: u32) -> Self {
        Self { spin_tries }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        alerted: &AtomicBool,
    ) -> Result<i64> {
        let mut counter = self.spin_tries;
        loop {
            check_alert(alerted)?;
            let available = available_sequence(cursor, dependent_sequences);
            if available >= sequence {
                return Ok(available);
            }

            if counter == 0 {
                thread::yield_now();
            } else {
                counter -= 1;
                hint::spin_loop();
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Sleeping wait strategy
///
/// Spins, then yields, then sleeps for a short fixed duration between checks.
#[derive(Debug, Clone, Copy)]
pub struct SleepingWaitStrategy {
    retries: u32,
    sleep_duration: Duration,
}

impl SleepingWaitStrategy {
    pub const DEFAULT_RETRIES: u32 = 200;
    pub const DEFAULT_SLEEP: Duration = Duration::from_nanos(100);

    pub fn new() -> Self {
        Self::new_with_retries(Self::DEFAULT_RETRIES, Self::DEFAULT_SLEEP)
    }

    /// Create a sleeping strategy
    ///
    /// # Arguments
    /// * `retries` - Attempts before sleeping; the first half spins, the second half yields
    /// * `sleep_duration` - How long to sleep between checks once retries run out
    pub fn new_with_retries(retries: u32, sleep_duration: Duration) -> Self {
        Self {
            retries,
            sleep_duration,
        }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        alerted: &AtomicBool,
    ) -> Result<i64> {
        let yield_below = self.retries / 2;
        let mut counter = self.retries;
        loop {
            check_alert(alerted)?;
            let available = available_sequence(cursor, dependent_sequences);
            if available >= sequence {
                return Ok(available);
            }

            if counter > yield_below {
                counter -= 1;
                hint::spin_loop();
            } else if counter > 0 {
                counter -= 1;
                thread::yield_now();
            } else {
                thread::sleep(self.sleep_duration);
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Blocking wait strategy using a mutex and condition variable
///
/// Waiters park until a publish or alert signals them. The cursor is re-checked
/// under the lock before every wait, so a signal issued between the check and the
/// wait cannot be lost.
#[derive(Debug, Default)]
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWaitStrategy {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        alerted: &AtomicBool,
    ) -> Result<i64> {
        if cursor.get() < sequence {
            let mut guard = self.mutex.lock();
            loop {
                check_alert(alerted)?;
                if cursor.get() >= sequence {
                    break;
                }
                self.condvar.wait(&mut guard);
            }
        }

        // Upstream processors do not signal, so dependents are polled.
        let backoff = Backoff::new();
        loop {
            check_alert(alerted)?;
            let available = available_sequence(cursor, dependent_sequences);
            if available >= sequence {
                return Ok(available);
            }
            backoff.snooze();
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }
}
