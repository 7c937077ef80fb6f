//! `seqring` - Sequence-Coordinated Ring Buffer
//!
//! An implementation of the Disruptor pattern for inter-thread messaging: a
//! pre-allocated ring buffer whose producers and consumers coordinate only through
//! monotonically increasing sequence counters.
//!
//! ## Quick Start
//!
//! ```rust
//! use seqring::disruptor::{
//!     Disruptor, ProducerType, BusySpinWaitStrategy, DefaultEventFactory,
//!     EventHandler, Result,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Debug, Default)]
//! struct MyEvent {
//!     value: i64,
//! }
//!
//! struct SumHandler {
//!     sum: i64,
//! }
//!
//! impl EventHandler<MyEvent> for SumHandler {
//!     fn on_event(&mut self, event: &mut MyEvent, _sequence: i64, _end_of_batch: bool) -> Result<()> {
//!         self.sum += event.value;
//!         Ok(())
//!     }
//! }
//!
//! let mut disruptor = Disruptor::new(
//!     DefaultEventFactory::<MyEvent>::new(),
//!     1024, // must be a power of 2
//!     ProducerType::Single,
//!     Arc::new(BusySpinWaitStrategy::new()),
//! )
//! .unwrap();
//! disruptor.handle_events_with(SumHandler { sum: 0 }).unwrap();
//! disruptor.start().unwrap();
//!
//! let publisher = disruptor.publisher();
//! for i in 0..10_000 {
//!     publisher.publish_with(|event, _sequence| event.value = i).unwrap();
//! }
//!
//! // Drains every published event, then stops the processor threads
//! disruptor.shutdown().unwrap();
//! ```
//!
//! ## Architecture
//!
//! - **`Sequence`**: Cache-padded atomic counter; the only shared coordination state
//! - **`RingBuffer`**: Pre-allocated slots indexed by `sequence & (capacity - 1)`
//! - **`Sequencer`**: Claims and publishes slots (single or multi producer) and
//!   keeps producers from lapping the slowest gating consumer
//! - **`WaitStrategy`**: How consumers wait for a sequence (spin, yield, sleep, block)
//! - **`SequenceBarrier`**: A consumer's view of the cursor and its upstream stages,
//!   plus the alert flag used to stop it
//! - **`BatchEventProcessor`**: The consumer loop driving an `EventHandler`
//! - **`Disruptor`**: Wires everything above into a processing graph

pub mod disruptor;

pub use disruptor::{
    is_power_of_two,
    BatchEventProcessor,
    BlockingWaitStrategy,
    BusySpinWaitStrategy,
    DefaultEventFactory,
    Disruptor,
    DisruptorConfig,
    DisruptorError,
    EventFactory,
    EventHandler,
    EventPublisher,
    ExceptionHandler,
    MultiProducerSequencer,
    ProducerType,
    Result,
    RingBuffer,
    Sequence,
    SequenceBarrier,
    Sequencer,
    SingleProducerSequencer,
    SleepingWaitStrategy,
    WaitStrategy,
    YieldingWaitStrategy,
    INITIAL_CURSOR_VALUE,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the version of the `seqring` library
#[must_use]
pub fn version() -> &'static str {
    VERSION
}
