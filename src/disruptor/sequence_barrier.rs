//! Sequence Barrier Implementation
//!
//! A sequence barrier computes the highest sequence a consumer may safely read:
//! the minimum of the producer cursor and any upstream processor sequences.

use crate::disruptor::{DisruptorError, Result, Sequence, WaitStrategy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Coordination barrier between a consumer and the sequences it depends on
pub trait SequenceBarrier: Send + Sync + std::fmt::Debug {
    /// Wait for the given sequence to become available
    ///
    /// # Returns
    /// The highest sequence currently safe to consume (may exceed `sequence`)
    ///
    /// # Errors
    /// Returns `DisruptorError::Alert` once the barrier has been alerted
    fn wait_for(&self, sequence: i64) -> Result<i64>;

    /// Non-blocking snapshot of the producer cursor
    fn get_cursor(&self) -> i64;

    /// Check if this barrier has been alerted
    fn is_alerted(&self) -> bool;

    /// Interrupt any current and future waits
    ///
    /// Idempotent and safe to call from any thread, including concurrently with
    /// an in-progress [`SequenceBarrier::wait_for`].
    fn alert(&self);

    /// Reset the alert so the barrier can block again
    fn clear_alert(&self);

    /// Return `DisruptorError::Alert` if the barrier has been alerted
    fn check_alert(&self) -> Result<()> {
        if self.is_alerted() {
            Err(DisruptorError::Alert)
        } else {
            Ok(())
        }
    }
}

/// Standard sequence barrier rooted at a sequencer's cursor
#[derive(Debug)]
pub struct ProcessingSequenceBarrier {
    cursor: Arc<Sequence>,
    wait_strategy: Arc<dyn WaitStrategy>,
    dependent_sequences: Vec<Arc<Sequence>>,
    alerted: AtomicBool,
}

impl ProcessingSequenceBarrier {
    /// Create a new processing sequence barrier
    ///
    /// # Arguments
    /// * `cursor` - The published-boundary cursor of the sequencer
    /// * `wait_strategy` - The wait strategy shared with the sequencer
    /// * `dependent_sequences` - Upstream processor sequences, empty for a first stage
    pub fn new(
        cursor: Arc<Sequence>,
        wait_strategy: Arc<dyn WaitStrategy>,
        dependent_sequences: Vec<Arc<Sequence>>,
    ) -> Self {
        Self {
            cursor,
            wait_strategy,
            dependent_sequences,
            alerted: AtomicBool::new(false),
        }
    }

    /// Sequences this barrier depends on besides the cursor
    pub fn dependent_sequences(&self) -> &[Arc<Sequence>] {
        &self.dependent_sequences
    }
}

impl SequenceBarrier for ProcessingSequenceBarrier {
    fn wait_for(&self, sequence: i64) -> Result<i64> {
        self.check_alert()?;

        self.wait_strategy.wait_for(
            sequence,
            &self.cursor,
            &self.dependent_sequences,
            &self.alerted,
        )
    }

    fn get_cursor(&self) -> i64 {
        self.cursor.get()
    }

    fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }

    fn alert(&self) {
        if !self.alerted.swap(true, Ordering::AcqRel) {
            tracing::debug!(cursor = self.cursor.get(), "sequence barrier alerted");
        }
        self.wait_strategy.signal_all_when_blocking();
    }

    fn clear_alert(&self) {
        self.alerted.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::{BlockingWaitStrategy, YieldingWaitStrategy};
    use std::thread;
    use std::time::Duration;

    fn barrier_with(
        cursor: &Arc<Sequence>,
        dependents: Vec<Arc<Sequence>>,
    ) -> Arc<ProcessingSequenceBarrier> {
        Arc::new(ProcessingSequenceBarrier::new(
            Arc::clone(cursor),
            Arc::new(BlockingWaitStrategy::new()),
            dependents,
        ))
    }

    #[test]
    fn test_wait_for_available_sequence() {
        let cursor = Arc::new(Sequence::new(10));
        let barrier = barrier_with(&cursor, vec![]);

        assert_eq!(barrier.wait_for(5), Ok(10));
        assert_eq!(barrier.get_cursor(), 10);
    }

    #[test]
    fn test_wait_for_respects_dependents() {
        let cursor = Arc::new(Sequence::new(10));
        let barrier = barrier_with(&cursor, vec![Arc::new(Sequence::new(5))]);

        assert_eq!(barrier.wait_for(5), Ok(5));
    }

    #[test]
    fn test_alerted_barrier_never_blocks() {
        let cursor = Arc::new(Sequence::new(10));
        let barrier = barrier_with(&cursor, vec![]);

        assert!(!barrier.is_alerted());
        barrier.alert();
        assert!(barrier.is_alerted());

        // Even an available sequence reports the alert
        assert_eq!(barrier.wait_for(5), Err(DisruptorError::Alert));
        assert_eq!(barrier.wait_for(50), Err(DisruptorError::Alert));
        assert_eq!(barrier.check_alert(), Err(DisruptorError::Alert));

        barrier.clear_alert();
        assert!(barrier.check_alert().is_ok());
        assert_eq!(barrier.wait_for(5), Ok(10));
    }

    #[test]
    fn test_alert_interrupts_blocked_waiter() {
        let cursor = Arc::new(Sequence::default());
        let barrier = barrier_with(&cursor, vec![]);

        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait_for(0))
        };

        thread::sleep(Duration::from_millis(20));
        barrier.alert();

        assert_eq!(waiter.join().unwrap(), Err(DisruptorError::Alert));
    }

    #[test]
    fn test_concurrent_alerts_are_idempotent() {
        let cursor = Arc::new(Sequence::default());
        let barrier = Arc::new(ProcessingSequenceBarrier::new(
            Arc::clone(&cursor),
            Arc::new(YieldingWaitStrategy::new()),
            vec![],
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || barrier.alert())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(barrier.is_alerted());
        assert_eq!(barrier.wait_for(0), Err(DisruptorError::Alert));
    }
}
