//! Event publishing
//!
//! [`EventPublisher`] pairs a ring buffer with its sequencer and exposes the
//! two-phase claim/publish protocol, plus closure based helpers that do both
//! steps and cannot forget to publish.

use crate::disruptor::{Result, RingBuffer, Sequencer};
use std::sync::Arc;

/// Publishes events into a ring buffer through its sequencer
///
/// Cloning is cheap. A publisher backed by a single-producer sequencer only
/// claims from the first thread that publishes through it or any of its clones;
/// claims from other threads fail with `ConcurrentProducer`. Use
/// [`ProducerType::Multi`] to publish from several threads.
///
/// [`ProducerType::Multi`]: crate::disruptor::ProducerType::Multi
pub struct EventPublisher<T> {
    ring_buffer: Arc<RingBuffer<T>>,
    sequencer: Arc<dyn Sequencer>,
}

impl<T> Clone for EventPublisher<T> {
    fn clone(&self) -> Self {
        Self {
            ring_buffer: Arc::clone(&self.ring_buffer),
            sequencer: Arc::clone(&self.sequencer),
        }
    }
}

impl<T> std::fmt::Debug for EventPublisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("sequencer", &self.sequencer)
            .finish_non_exhaustive()
    }
}

impl<T> EventPublisher<T>
where
    T: Send + Sync,
{
    /// Create a new publisher
    ///
    /// # Arguments
    /// * `ring_buffer` - The ring buffer to publish to
    /// * `sequencer` - The sequencer coordinating `ring_buffer`
    pub fn new(ring_buffer: Arc<RingBuffer<T>>, sequencer: Arc<dyn Sequencer>) -> Self {
        Self {
            ring_buffer,
            sequencer,
        }
    }

    pub fn ring_buffer(&self) -> &Arc<RingBuffer<T>> {
        &self.ring_buffer
    }

    pub fn sequencer(&self) -> &Arc<dyn Sequencer> {
        &self.sequencer
    }

    /// The highest published sequence
    pub fn cursor(&self) -> i64 {
        self.sequencer.get_cursor()
    }

    /// Claim `n` slots, waiting for capacity, and return the highest claimed sequence
    pub fn claim(&self, n: i64) -> Result<i64> {
        self.sequencer.claim(n)
    }

    /// Claim `n` slots or fail with `InsufficientCapacity` without waiting
    pub fn try_claim(&self, n: i64) -> Result<i64> {
        self.sequencer.try_claim(n)
    }

    pub fn publish(&self, sequence: i64) {
        self.sequencer.publish(sequence);
    }

    pub fn publish_range(&self, low: i64, high: i64) {
        self.sequencer.publish_range(low, high);
    }

    pub fn remaining_capacity(&self) -> i64 {
        self.sequencer.remaining_capacity()
    }

    /// Mutable access to a claimed slot
    ///
    /// # Safety
    /// `sequence` must have been claimed by this publisher and not yet published.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn event_mut(&self, sequence: i64) -> &mut T {
        &mut *self.ring_buffer.get_unchecked_mut(sequence)
    }

    /// Claim one slot, fill it with `update` and publish it
    ///
    /// Waits for capacity when the buffer is full.
    pub fn publish_with<F>(&self, update: F) -> Result<i64>
    where
        F: FnOnce(&mut T, i64),
    {
        let sequence = self.sequencer.next()?;
        self.write_and_publish(sequence, update);
        Ok(sequence)
    }

    /// Like [`publish_with`](Self::publish_with) but fails with
    /// `InsufficientCapacity` instead of waiting
    pub fn try_publish_with<F>(&self, update: F) -> Result<i64>
    where
        F: FnOnce(&mut T, i64),
    {
        let sequence = self.sequencer.try_claim(1)?;
        self.write_and_publish(sequence, update);
        Ok(sequence)
    }

    /// Claim `n` slots, fill each one in order and publish the whole range
    ///
    /// Returns the highest published sequence.
    pub fn publish_batch_with<F>(&self, n: i64, mut update: F) -> Result<i64>
    where
        F: FnMut(&mut T, i64),
    {
        let high = self.sequencer.claim(n)?;
        let low = high - (n - 1);

        for sequence in low..=high {
            // SAFETY: the whole range was claimed above and is unpublished
            let event = unsafe { self.event_mut(sequence) };
            update(event, sequence);
        }

        self.sequencer.publish_range(low, high);
        Ok(high)
    }

    fn write_and_publish<F>(&self, sequence: i64, update: F)
    where
        F: FnOnce(&mut T, i64),
    {
        // SAFETY: the sequencer handed `sequence` to this call exclusively
        let event = unsafe { self.event_mut(sequence) };
        update(event, sequence);
        self.sequencer.publish(sequence);
    }
}
