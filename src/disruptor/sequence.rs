//! Sequence implementation for the Disruptor
//!
//! The Sequence is used to track progress through the ring buffer and coordinate
//! between producers and consumers. Every cross-thread hand-off goes through an
//! acquire load of a Sequence paired with a release store on the writing side.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::disruptor::INITIAL_CURSOR_VALUE;

/// A sequence number that occupies its own cache line
///
/// Sequences are shared by `Arc` once registered with a barrier or sequencer;
/// their identity, not their value, is what gating sets track.
pub struct Sequence {
    value: CachePadded<AtomicI64>,
}

impl Sequence {
    /// Create a new sequence with the given initial value
    pub fn new(initial_value: i64) -> Self {
        Self {
            value: CachePadded::new(AtomicI64::new(initial_value)),
        }
    }

    /// Get the current sequence value
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Set the sequence value
    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Atomically replace `expected` with `new`
    ///
    /// # Returns
    /// True if the swap happened
    #[inline]
    pub fn compare_and_set(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange(expected, new, Ordering::SeqCst, Ordering::Acquire)
            .is_ok()
    }

    /// Add `delta` and return the new value
    #[inline]
    pub fn increment_and_get(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::AcqRel) + delta
    }

    /// Get the minimum value over a set of sequences
    ///
    /// # Arguments
    /// * `sequences` - The sequences to inspect
    /// * `minimum` - Upper bound returned when `sequences` is empty or all are higher
    pub fn get_minimum_sequence(sequences: &[Arc<Sequence>], minimum: i64) -> i64 {
        sequences
            .iter()
            .map(|sequence| sequence.get())
            .fold(minimum, i64::min)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(INITIAL_CURSOR_VALUE)
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("value", &self.get())
            .finish()
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sequence_default() {
        let seq = Sequence::default();
        assert_eq!(seq.get(), INITIAL_CURSOR_VALUE);
    }

    #[test]
    fn test_sequence_set_get() {
        let seq = Sequence::new(0);
        seq.set(100);
        assert_eq!(seq.get(), 100);
    }

    #[test]
    fn test_sequence_increment() {
        let seq = Sequence::new(10);
        assert_eq!(seq.increment_and_get(1), 11);
        assert_eq!(seq.increment_and_get(5), 16);
        assert_eq!(seq.get(), 16);
    }

    #[test]
    fn test_sequence_compare_and_set() {
        let seq = Sequence::new(10);

        assert!(seq.compare_and_set(10, 20));
        assert_eq!(seq.get(), 20);

        assert!(!seq.compare_and_set(10, 30));
        assert_eq!(seq.get(), 20);
    }

    #[test]
    fn test_sequence_is_cache_line_sized() {
        assert!(std::mem::align_of::<Sequence>() >= 64);
        assert!(std::mem::size_of::<Sequence>() >= 64);
    }

    #[test]
    fn test_minimum_sequence() {
        let sequences = vec![
            Arc::new(Sequence::new(10)),
            Arc::new(Sequence::new(5)),
            Arc::new(Sequence::new(20)),
        ];
        assert_eq!(Sequence::get_minimum_sequence(&sequences, i64::MAX), 5);
        assert_eq!(Sequence::get_minimum_sequence(&sequences, 3), 3);
        assert_eq!(Sequence::get_minimum_sequence(&[], 42), 42);
    }

    #[test]
    fn test_sequence_thread_safety() {
        let seq = Arc::new(Sequence::new(0));
        let mut handles = vec![];

        for _ in 0..10 {
            let seq_clone = Arc::clone(&seq);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    seq_clone.increment_and_get(1);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(seq.get(), 10000);
    }
}
