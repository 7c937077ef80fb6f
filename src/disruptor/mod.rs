//! Seqring Disruptor Implementation
//!
//! A fixed-capacity ring buffer coordinated entirely through monotonically
//! increasing sequence counters. Producers claim and publish slots through a
//! [`Sequencer`], consumers wait on a [`SequenceBarrier`] and drain batches with
//! a [`BatchEventProcessor`].

pub mod config;
#[allow(clippy::module_inception)]
pub mod disruptor;
pub mod event_factory;
pub mod event_handler;
pub mod event_processor;
pub mod exception_handler;
pub mod producer;
pub mod producer_type;
pub mod ring_buffer;
pub mod sequence;
pub mod sequence_barrier;
pub mod sequencer;
pub mod thread_management;
pub mod wait_strategy;


pub use config::{DisruptorConfig, WaitStrategyKind};
pub use disruptor::Disruptor;
pub use event_factory::{ClosureEventFactory, DefaultEventFactory, EventFactory};
pub use event_handler::{ClosureEventHandler, EventHandler};
pub use event_processor::{BatchEventProcessor, ProcessorHandle, ProcessorState, RunningProcessor};
pub use exception_handler::{DefaultExceptionHandler, ExceptionHandler};
pub use producer::EventPublisher;
pub use producer_type::ProducerType;
pub use ring_buffer::RingBuffer;
pub use sequence::Sequence;
pub use sequence_barrier::{ProcessingSequenceBarrier, SequenceBarrier};
pub use sequencer::{MultiProducerSequencer, Sequencer, SingleProducerSequencer};
pub use thread_management::{ManagedThread, ThreadBuilder};
pub use wait_strategy::{
    BlockingWaitStrategy, BusySpinWaitStrategy, SleepingWaitStrategy, WaitStrategy,
    YieldingWaitStrategy,
};

/// The value every sequence holds before anything has been published
pub const INITIAL_CURSOR_VALUE: i64 = -1;

/// Errors that can occur in the Disruptor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisruptorError {
    #[error("Buffer size must be a power of 2, got: {0}")]
    InvalidBufferSize(usize),

    #[error("Cannot claim {requested} slots from a buffer of size {buffer_size}")]
    InvalidClaimSize { requested: i64, buffer_size: usize },

    #[error("No gating sequences registered with the sequencer")]
    MissingGatingSequences,

    #[error("Single producer sequencer claimed from more than one thread")]
    ConcurrentProducer,

    #[error("Insufficient capacity in the ring buffer")]
    InsufficientCapacity,

    #[error("Sequence barrier has been alerted")]
    Alert,

    #[error("Event processor has already been started")]
    ProcessorAlreadyStarted,

    #[error("Disruptor has already been started")]
    AlreadyStarted,

    #[error("Event handling failed: {0}")]
    EventHandling(String),

    #[error("Failed to spawn processor thread: {0}")]
    ThreadSpawn(String),

    #[error("Processor thread panicked: {0}")]
    ThreadPanicked(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DisruptorError>;

/// Utility function to check if a number is a power of 2
pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}
