//! Sequencer Implementation
//!
//! Sequencers hand out sequence numbers to producers and make published slots
//! visible to consumers. They also hold the gating sequences of the slowest
//! consumers so that a producer never wraps onto a slot that is still needed.

use crate::disruptor::{
    is_power_of_two, DisruptorError, ProcessingSequenceBarrier, Result, Sequence, WaitStrategy,
    INITIAL_CURSOR_VALUE,
};
use crossbeam_utils::{Backoff, CachePadded};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Producer-side claim/publish protocol
///
/// The cursor returned by [`Sequencer::cursor`] is always the highest sequence
/// for which every slot up to and including it has been published.
pub trait Sequencer: Send + Sync + std::fmt::Debug {
    /// The published-boundary cursor
    fn cursor(&self) -> &Arc<Sequence>;

    /// Non-blocking snapshot of the published boundary
    fn get_cursor(&self) -> i64 {
        self.cursor().get()
    }

    /// The size of the ring buffer this sequencer coordinates
    fn buffer_size(&self) -> usize;

    /// The wait strategy signalled on publish
    fn wait_strategy(&self) -> &Arc<dyn WaitStrategy>;

    /// Claim the next `n` sequences for exclusive writing
    ///
    /// Stalls while claiming would overwrite a slot still required by the slowest
    /// gating sequence. With gating sequences that never advance this blocks forever.
    ///
    /// # Returns
    /// The highest claimed sequence; the claimed range is `hi - (n - 1)..=hi`
    ///
    /// # Errors
    /// * `InvalidClaimSize` if `n` is not within `1..=buffer_size`
    /// * `MissingGatingSequences` if no gating sequences were registered
    /// * `ConcurrentProducer` if a single-producer sequencer is claimed from a
    ///   thread other than its producer thread
    fn claim(&self, n: i64) -> Result<i64>;

    /// Claim a single sequence
    fn next(&self) -> Result<i64> {
        self.claim(1)
    }

    /// Claim the next `n` sequences without stalling
    ///
    /// # Errors
    /// As [`Sequencer::claim`], plus `InsufficientCapacity` when the claim would wrap
    /// onto unconsumed slots
    fn try_claim(&self, n: i64) -> Result<i64>;

    /// Publish a claimed sequence
    fn publish(&self, sequence: i64);

    /// Publish a contiguous range of claimed sequences
    fn publish_range(&self, low: i64, high: i64);

    /// Whether `required_capacity` slots could be claimed right now
    fn has_available_capacity(&self, required_capacity: i64) -> bool;

    /// Number of slots that could be claimed right now
    fn remaining_capacity(&self) -> i64;

    /// Replace the gating sequences
    ///
    /// Must be called during wiring, before any publishing. Calling it while
    /// producers are active is unsupported.
    fn set_gating_sequences(&self, sequences: Vec<Arc<Sequence>>);

    /// Append gating sequences during wiring
    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]);

    /// Minimum over the gating sequences, or the cursor when there are none
    fn minimum_gating_sequence(&self) -> i64;

    /// Create a consumer barrier rooted at this sequencer's cursor
    ///
    /// # Arguments
    /// * `dependent_sequences` - Upstream processor sequences the consumer must trail
    fn new_barrier(&self, dependent_sequences: Vec<Arc<Sequence>>) -> ProcessingSequenceBarrier {
        ProcessingSequenceBarrier::new(
            Arc::clone(self.cursor()),
            Arc::clone(self.wait_strategy()),
            dependent_sequences,
        )
    }
}

/// The downstream sequences a producer must not outrun
#[derive(Debug, Default)]
struct GatingSequences {
    sequences: RwLock<Vec<Arc<Sequence>>>,
    registered: AtomicBool,
}

impl GatingSequences {
    #[inline]
    fn ensure_registered(&self) -> Result<()> {
        if self.registered.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DisruptorError::MissingGatingSequences)
        }
    }

    fn minimum(&self, default: i64) -> i64 {
        Sequence::get_minimum_sequence(&self.sequences.read(), default)
    }

    fn set(&self, sequences: Vec<Arc<Sequence>>) {
        let registered = !sequences.is_empty();
        *self.sequences.write() = sequences;
        self.registered.store(registered, Ordering::Release);
    }

    fn add(&self, sequences: &[Arc<Sequence>]) {
        let mut guard = self.sequences.write();
        guard.extend_from_slice(sequences);
        self.registered.store(!guard.is_empty(), Ordering::Release);
    }
}

fn validate_buffer_size(buffer_size: usize) -> Result<i64> {
    if !is_power_of_two(buffer_size) {
        return Err(DisruptorError::InvalidBufferSize(buffer_size));
    }
    i64::try_from(buffer_size).map_err(|_| DisruptorError::InvalidBufferSize(buffer_size))
}

#[inline]
fn validate_claim(n: i64, buffer_size: usize) -> Result<()> {
    if n < 1 || n > buffer_size as i64 {
        return Err(DisruptorError::InvalidClaimSize {
            requested: n,
            buffer_size,
        });
    }
    Ok(())
}

/// Process-unique id of the calling thread, never 0
fn producer_token() -> u64 {
    static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);
    thread_local! {
        static TOKEN: u64 = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    }
    TOKEN.with(|token| *token)
}

/// Single producer sequencer
///
/// Only one thread may ever claim. The first thread to call `claim` or
/// `try_claim` becomes the producer thread, and claims from any other thread fail
/// with `ConcurrentProducer`. The claim counter is private to the producer thread,
/// so no CAS is needed; publishing is a single release store.
#[derive(Debug)]
pub struct SingleProducerSequencer {
    buffer_size: usize,
    wait_strategy: Arc<dyn WaitStrategy>,
    cursor: Arc<Sequence>,
    /// Token of the thread that owns the claim counter, 0 until the first claim
    owner: AtomicU64,
    /// Highest claimed sequence, written only by the producer thread
    next_value: CachePadded<AtomicI64>,
    /// Last observed gating minimum, to avoid scanning the gating set on every claim
    cached_gating_sequence: CachePadded<AtomicI64>,
    gating_sequences: GatingSequences,
}

impl SingleProducerSequencer {
    /// Create a new single producer sequencer
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBufferSize` if buffer_size is not a power of 2
    pub fn new(buffer_size: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Result<Self> {
        validate_buffer_size(buffer_size)?;

        Ok(Self {
            buffer_size,
            wait_strategy,
            cursor: Arc::new(Sequence::default()),
            owner: AtomicU64::new(0),
            next_value: CachePadded::new(AtomicI64::new(INITIAL_CURSOR_VALUE)),
            cached_gating_sequence: CachePadded::new(AtomicI64::new(INITIAL_CURSOR_VALUE)),
            gating_sequences: GatingSequences::default(),
        })
    }

    /// Bind the claim counter to the calling thread on first use
    #[inline]
    fn ensure_producer_thread(&self) -> Result<()> {
        let token = producer_token();
        if self.owner.load(Ordering::Acquire) == token {
            return Ok(());
        }
        match self
            .owner
            .compare_exchange(0, token, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(_) => {
                tracing::error!("single producer sequencer claimed from a second thread");
                Err(DisruptorError::ConcurrentProducer)
            }
        }
    }

    /// Returns the gating minimum once `wrap_point` is no longer ahead of it,
    /// or `None` if `stall` is false and the claim would wrap.
    fn await_capacity(&self, next_value: i64, wrap_point: i64, stall: bool) -> Option<i64> {
        let cached = self.cached_gating_sequence.load(Ordering::Relaxed);
        if wrap_point <= cached && cached <= next_value {
            return Some(cached);
        }

        let mut min_sequence = self.gating_sequences.minimum(next_value);
        if wrap_point > min_sequence {
            if !stall {
                return None;
            }
            tracing::trace!(wrap_point, min_sequence, "producer stalled on gating sequences");
            let backoff = Backoff::new();
            while wrap_point > min_sequence {
                backoff.snooze();
                min_sequence = self.gating_sequences.minimum(next_value);
            }
        }

        self.cached_gating_sequence
            .store(min_sequence, Ordering::Relaxed);
        Some(min_sequence)
    }
}

impl Sequencer for SingleProducerSequencer {
    fn cursor(&self) -> &Arc<Sequence> {
        &self.cursor
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn wait_strategy(&self) -> &Arc<dyn WaitStrategy> {
        &self.wait_strategy
    }

    fn claim(&self, n: i64) -> Result<i64> {
        validate_claim(n, self.buffer_size)?;
        self.gating_sequences.ensure_registered()?;
        self.ensure_producer_thread()?;

        let next_value = self.next_value.load(Ordering::Relaxed);
        let next_sequence = next_value + n;
        let wrap_point = next_sequence - self.buffer_size as i64;

        self.await_capacity(next_value, wrap_point, true);

        self.next_value.store(next_sequence, Ordering::Relaxed);
        Ok(next_sequence)
    }

    fn try_claim(&self, n: i64) -> Result<i64> {
        validate_claim(n, self.buffer_size)?;
        self.gating_sequences.ensure_registered()?;
        self.ensure_producer_thread()?;

        let next_value = self.next_value.load(Ordering::Relaxed);
        let next_sequence = next_value + n;
        let wrap_point = next_sequence - self.buffer_size as i64;

        if self.await_capacity(next_value, wrap_point, false).is_none() {
            return Err(DisruptorError::InsufficientCapacity);
        }

        self.next_value.store(next_sequence, Ordering::Relaxed);
        Ok(next_sequence)
    }

    fn publish(&self, sequence: i64) {
        self.cursor.set(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn publish_range(&self, _low: i64, high: i64) {
        self.publish(high);
    }

    fn has_available_capacity(&self, required_capacity: i64) -> bool {
        let next_value = self.next_value.load(Ordering::Relaxed);
        let wrap_point = next_value + required_capacity - self.buffer_size as i64;
        self.await_capacity(next_value, wrap_point, false).is_some()
    }

    fn remaining_capacity(&self) -> i64 {
        let produced = self.next_value.load(Ordering::Relaxed);
        let consumed = self.gating_sequences.minimum(produced);
        self.buffer_size as i64 - (produced - consumed)
    }

    fn set_gating_sequences(&self, sequences: Vec<Arc<Sequence>>) {
        self.gating_sequences.set(sequences);
    }

    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.gating_sequences.add(sequences);
    }

    fn minimum_gating_sequence(&self) -> i64 {
        self.gating_sequences.minimum(self.cursor.get())
    }
}

/// Multi producer sequencer
///
/// Producers reserve ranges with a CAS loop on a shared claim counter. Publishing
/// marks per-slot availability flags (the slot's lap number, `sequence >> log2(size)`),
/// then advances the cursor over the contiguous run of available slots. A producer
/// that publishes ahead of an earlier claim leaves the cursor behind the gap; the
/// earlier producer carries it forward when it publishes. Consumers therefore never
/// observe an unpublished slot, and publishing never blocks.
#[derive(Debug)]
pub struct MultiProducerSequencer {
    buffer_size: usize,
    wait_strategy: Arc<dyn WaitStrategy>,
    /// Published boundary
    cursor: Arc<Sequence>,
    /// Highest reserved sequence
    claim_sequence: Sequence,
    cached_gating_sequence: Sequence,
    gating_sequences: GatingSequences,
    available_buffer: Box<[AtomicI32]>,
    index_mask: i64,
    index_shift: u32,
}

impl MultiProducerSequencer {
    /// Create a new multi producer sequencer
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBufferSize` if buffer_size is not a power of 2
    pub fn new(buffer_size: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Result<Self> {
        let size = validate_buffer_size(buffer_size)?;

        let available_buffer: Box<[AtomicI32]> =
            (0..buffer_size).map(|_| AtomicI32::new(-1)).collect();

        Ok(Self {
            buffer_size,
            wait_strategy,
            cursor: Arc::new(Sequence::default()),
            claim_sequence: Sequence::default(),
            cached_gating_sequence: Sequence::default(),
            gating_sequences: GatingSequences::default(),
            available_buffer,
            index_mask: size - 1,
            index_shift: buffer_size.trailing_zeros(),
        })
    }

    #[inline]
    fn availability_flag(&self, sequence: i64) -> i32 {
        (sequence >> self.index_shift) as i32
    }

    #[inline]
    fn slot(&self, sequence: i64) -> &AtomicI32 {
        &self.available_buffer[(sequence & self.index_mask) as usize]
    }

    #[inline]
    fn set_available(&self, sequence: i64) {
        self.slot(sequence)
            .store(self.availability_flag(sequence), Ordering::SeqCst);
    }

    /// Check whether a specific sequence has been published in the current lap
    pub fn is_available(&self, sequence: i64) -> bool {
        self.slot(sequence).load(Ordering::SeqCst) == self.availability_flag(sequence)
    }

    /// Highest reserved (not necessarily published) sequence
    pub fn highest_claimed_sequence(&self) -> i64 {
        self.claim_sequence.get()
    }

    /// Move the cursor over every contiguous available slot past it
    fn advance_cursor(&self, published: i64) {
        loop {
            let current = self.cursor.get();
            if current >= published {
                return;
            }

            let mut highest = current;
            while self.is_available(highest + 1) {
                highest += 1;
            }

            if highest == current {
                // The slot after the cursor is still being written; its
                // publisher will carry the cursor over this one.
                return;
            }

            self.cursor.compare_and_set(current, highest);
        }
    }

    fn reserve(&self, n: i64, stall: bool) -> Result<i64> {
        let backoff = Backoff::new();
        let mut stalled = false;

        loop {
            let current = self.claim_sequence.get();
            let next = current + n;
            let wrap_point = next - self.buffer_size as i64;
            let cached = self.cached_gating_sequence.get();

            if wrap_point > cached || cached > current {
                let min_sequence = self.gating_sequences.minimum(current);
                if wrap_point > min_sequence {
                    if !stall {
                        return Err(DisruptorError::InsufficientCapacity);
                    }
                    if !stalled {
                        stalled = true;
                        tracing::trace!(
                            wrap_point,
                            min_sequence,
                            "producer stalled on gating sequences"
                        );
                    }
                    backoff.snooze();
                    continue;
                }
                self.cached_gating_sequence.set(min_sequence);
            } else if self.claim_sequence.compare_and_set(current, next) {
                return Ok(next);
            } else {
                backoff.spin();
            }
        }
    }
}

impl Sequencer for MultiProducerSequencer {
    fn cursor(&self) -> &Arc<Sequence> {
        &self.cursor
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn wait_strategy(&self) -> &Arc<dyn WaitStrategy> {
        &self.wait_strategy
    }

    fn claim(&self, n: i64) -> Result<i64> {
        validate_claim(n, self.buffer_size)?;
        self.gating_sequences.ensure_registered()?;
        self.reserve(n, true)
    }

    fn try_claim(&self, n: i64) -> Result<i64> {
        validate_claim(n, self.buffer_size)?;
        self.gating_sequences.ensure_registered()?;
        self.reserve(n, false)
    }

    fn publish(&self, sequence: i64) {
        self.set_available(sequence);
        self.advance_cursor(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn publish_range(&self, low: i64, high: i64) {
        for sequence in low..=high {
            self.set_available(sequence);
        }
        self.advance_cursor(high);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn has_available_capacity(&self, required_capacity: i64) -> bool {
        let current = self.claim_sequence.get();
        let wrap_point = current + required_capacity - self.buffer_size as i64;
        let cached = self.cached_gating_sequence.get();

        if wrap_point > cached || cached > current {
            let min_sequence = self.gating_sequences.minimum(current);
            if wrap_point > min_sequence {
                return false;
            }
            self.cached_gating_sequence.set(min_sequence);
        }
        true
    }

    fn remaining_capacity(&self) -> i64 {
        let produced = self.claim_sequence.get();
        let consumed = self.gating_sequences.minimum(produced);
        self.buffer_size as i64 - (produced - consumed)
    }

    fn set_gating_sequences(&self, sequences: Vec<Arc<Sequence>>) {
        self.gating_sequences.set(sequences);
    }

    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.gating_sequences.add(sequences);
    }

    fn minimum_gating_sequence(&self) -> i64 {
        self.gating_sequences.minimum(self.cursor.get())
    }
}
