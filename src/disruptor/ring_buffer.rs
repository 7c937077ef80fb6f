//! Ring Buffer Implementation
//!
//! This module provides the pre-allocated slot storage for the Disruptor.
//! Slots are created once by an [`EventFactory`] and only ever overwritten in
//! place afterwards; a sequence number is the sole index into the buffer.

use crate::disruptor::{is_power_of_two, DisruptorError, EventFactory, Result};
use std::cell::UnsafeCell;

/// Fixed-capacity storage for events
///
/// The ring buffer does not coordinate access by itself. Exclusive write access to
/// a slot is granted by claiming its sequence from a [`Sequencer`], and read access
/// by observing the published sequence through a [`SequenceBarrier`].
///
/// [`Sequencer`]: crate::disruptor::Sequencer
/// [`SequenceBarrier`]: crate::disruptor::SequenceBarrier
pub struct RingBuffer<T> {
    slots: Box<[UnsafeCell<T>]>,
    /// `buffer_size - 1`, kept as i64 to match the sequence type
    index_mask: i64,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer with the specified size and event factory
    ///
    /// The factory is invoked exactly `buffer_size` times.
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBufferSize` if buffer_size is not a power of 2.
    /// The size is never rounded.
    pub fn new<F>(buffer_size: usize, event_factory: F) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        if !is_power_of_two(buffer_size) || i64::try_from(buffer_size).is_err() {
            return Err(DisruptorError::InvalidBufferSize(buffer_size));
        }

        let slots: Box<[UnsafeCell<T>]> = (0..buffer_size)
            .map(|_| UnsafeCell::new(event_factory.new_instance()))
            .collect();

        Ok(Self {
            slots,
            index_mask: (buffer_size - 1) as i64,
        })
    }

    #[inline]
    fn index_of(&self, sequence: i64) -> usize {
        (sequence & self.index_mask) as usize
    }

    /// Get a shared reference to the event at the specified sequence
    ///
    /// # Safety
    /// No producer may write the slot while the reference is alive. The caller must
    /// have observed `sequence` as published, either through a [`SequenceBarrier`]
    /// or the sequencer cursor, and must keep producers from wrapping onto the slot,
    /// for example by not advancing a gating sequence past it.
    ///
    /// Reading without that guarantee does not compile:
    ///
    /// ```compile_fail
    /// use seqring::disruptor::{DefaultEventFactory, RingBuffer};
    ///
    /// let buffer = RingBuffer::new(8, DefaultEventFactory::<i64>::new()).unwrap();
    /// let _event = buffer.get(0);
    /// ```
    ///
    /// [`SequenceBarrier`]: crate::disruptor::SequenceBarrier
    #[inline]
    pub unsafe fn get(&self, sequence: i64) -> &T {
        let index = self.index_of(sequence);
        &*self.slots.get_unchecked(index).get()
    }

    /// Get a mutable reference to the event at the specified sequence
    #[inline]
    pub fn get_mut(&mut self, sequence: i64) -> &mut T {
        let index = self.index_of(sequence);
        self.slots[index].get_mut()
    }

    /// Get a raw pointer to the event at the specified sequence
    ///
    /// # Safety
    /// The caller must hold the exclusive right to this slot: either a claimed but
    /// unpublished sequence (producer side) or a published sequence that the caller's
    /// own processor sequence still gates (consumer side). No other reference to the
    /// slot may be alive while the pointer is dereferenced mutably.
    #[inline]
    pub unsafe fn get_unchecked_mut(&self, sequence: i64) -> *mut T {
        let index = self.index_of(sequence);
        self.slots.get_unchecked(index).get()
    }

    /// Get the capacity of the buffer
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl<T> std::fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .finish()
    }
}

// SAFETY: slot access is serialized by the sequence protocol: a slot is written by
// at most one producer inside its claim window and only read after its sequence is
// published with release semantics.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send + Sync> Sync for RingBuffer<T> {}
