//! Disruptor Main Class Implementation
//!
//! The [`Disruptor`] owns a ring buffer and its sequencer and wires event
//! processors into a dependency graph:
//!
//! * [`handle_events_with`](Disruptor::handle_events_with) adds a processor that
//!   reads directly behind the producer cursor.
//! * [`then`](Disruptor::then) adds a processor that only sees an event after every
//!   processor of the previous stage has finished with it.
//! * [`and`](Disruptor::and) adds a processor to the last stage, next to its siblings.
//!
//! Producers are gated on the processors nothing else depends on, so a slot is only
//! reused once every stage has consumed it.

use crate::disruptor::{
    BatchEventProcessor, DisruptorConfig, DisruptorError, EventFactory, EventHandler,
    EventPublisher, ProcessorHandle, ProducerType, Result, RingBuffer, RunningProcessor, Sequence,
    Sequencer, ThreadBuilder, WaitStrategy,
};
use crossbeam_utils::Backoff;
use std::sync::Arc;

type Launcher = Box<dyn FnOnce(ThreadBuilder) -> Result<RunningProcessor> + Send>;

struct Stage {
    dependencies: Vec<Arc<Sequence>>,
    sequences: Vec<Arc<Sequence>>,
}

/// The main Disruptor class
///
/// # Examples
/// ```
/// use seqring::disruptor::{
///     BlockingWaitStrategy, ClosureEventHandler, DefaultEventFactory, Disruptor, ProducerType,
/// };
/// use std::sync::Arc;
///
/// #[derive(Debug, Default)]
/// struct Tick {
///     price: i64,
/// }
///
/// let mut disruptor = Disruptor::new(
///     DefaultEventFactory::<Tick>::new(),
///     1024,
///     ProducerType::Single,
///     Arc::new(BlockingWaitStrategy::new()),
/// )
/// .unwrap();
///
/// disruptor
///     .handle_events_with(ClosureEventHandler::new(|tick: &mut Tick, _seq, _eob| {
///         tick.price *= 2;
///     }))
///     .unwrap();
/// disruptor.start().unwrap();
///
/// let publisher = disruptor.publisher();
/// for price in 0..100 {
///     publisher.publish_with(|tick, _seq| tick.price = price).unwrap();
/// }
///
/// disruptor.shutdown().unwrap();
/// ```
pub struct Disruptor<T> {
    ring_buffer: Arc<RingBuffer<T>>,
    sequencer: Arc<dyn Sequencer>,
    thread_name_prefix: String,
    pin_cores: Vec<usize>,
    stages: Vec<Stage>,
    handles: Vec<ProcessorHandle>,
    pending: Vec<Launcher>,
    running: Vec<RunningProcessor>,
    started: bool,
}

impl<T> Disruptor<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new Disruptor
    ///
    /// # Arguments
    /// * `event_factory` - Called once per slot to pre-allocate events
    /// * `buffer_size` - Ring buffer capacity, must be a power of 2
    /// * `producer_type` - Whether one or many threads publish
    /// * `wait_strategy` - Shared by every barrier of this Disruptor
    ///
    /// # Errors
    /// Returns `InvalidBufferSize` if `buffer_size` is not a power of 2
    pub fn new<F>(
        event_factory: F,
        buffer_size: usize,
        producer_type: ProducerType,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        let defaults = DisruptorConfig::default();
        Self::assemble(
            event_factory,
            buffer_size,
            producer_type,
            wait_strategy,
            defaults.thread_name_prefix,
            defaults.pin_cores,
        )
    }

    /// Create a Disruptor from a validated configuration
    pub fn from_config<F>(event_factory: F, config: &DisruptorConfig) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        config.validate()?;
        Self::assemble(
            event_factory,
            config.buffer_size,
            config.producer_type,
            config.wait_strategy.build(),
            config.thread_name_prefix.clone(),
            config.pin_cores.clone(),
        )
    }

    fn assemble<F>(
        event_factory: F,
        buffer_size: usize,
        producer_type: ProducerType,
        wait_strategy: Arc<dyn WaitStrategy>,
        thread_name_prefix: String,
        pin_cores: Vec<usize>,
    ) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        let sequencer = producer_type.create_sequencer(buffer_size, wait_strategy)?;
        let ring_buffer = Arc::new(RingBuffer::new(buffer_size, event_factory)?);

        tracing::debug!(buffer_size, %producer_type, "disruptor created");

        Ok(Self {
            ring_buffer,
            sequencer,
            thread_name_prefix,
            pin_cores,
            stages: Vec::new(),
            handles: Vec::new(),
            pending: Vec::new(),
            running: Vec::new(),
            started: false,
        })
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

    pub fn buffer_size(&self) -> usize {
        self.ring_buffer.capacity()
    }

    pub fn remaining_capacity(&self) -> i64 {
        self.sequencer.remaining_capacity()
    }

    /// A publisher for this Disruptor's ring buffer
    ///
    /// Claims fail with `MissingGatingSequences` until a handler has been added.
    pub fn publisher(&self) -> EventPublisher<T> {
        EventPublisher::new(Arc::clone(&self.ring_buffer), Arc::clone(&self.sequencer))
    }

    /// Control handles of every processor, in the order they were added
    pub fn processors(&self) -> &[ProcessorHandle] {
        &self.handles
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Add a processor that consumes directly behind the producer cursor
    ///
    /// Every processor added this way belongs to the first stage.
    ///
    /// # Errors
    /// Returns `AlreadyStarted` once [`start`](Self::start) has been called
    pub fn handle_events_with<H>(&mut self, event_handler: H) -> Result<&mut Self>
    where
        H: EventHandler<T> + 'static,
    {
        self.ensure_not_started()?;
        if self.stages.is_empty() {
            self.stages.push(Stage {
                dependencies: Vec::new(),
                sequences: Vec::new(),
            });
        }
        self.add_processor(0, event_handler)
    }

    /// Add a processor in a new stage behind every processor of the last stage
    ///
    /// With no previous stage this is the same as
    /// [`handle_events_with`](Self::handle_events_with).
    pub fn then<H>(&mut self, event_handler: H) -> Result<&mut Self>
    where
        H: EventHandler<T> + 'static,
    {
        self.ensure_not_started()?;
        let dependencies = match self.stages.last() {
            Some(stage) => stage.sequences.clone(),
            None => return self.handle_events_with(event_handler),
        };
        self.stages.push(Stage {
            dependencies,
            sequences: Vec::new(),
        });
        self.add_processor(self.stages.len() - 1, event_handler)
    }

    /// Add a processor to the last stage, sharing its dependencies
    pub fn and<H>(&mut self, event_handler: H) -> Result<&mut Self>
    where
        H: EventHandler<T> + 'static,
    {
        self.ensure_not_started()?;
        match self.stages.len() {
            0 => self.handle_events_with(event_handler),
            stages => self.add_processor(stages - 1, event_handler),
        }
    }

    fn ensure_not_started(&self) -> Result<()> {
        if self.started {
            return Err(DisruptorError::AlreadyStarted);
        }
        Ok(())
    }

    fn add_processor<H>(&mut self, stage_index: usize, event_handler: H) -> Result<&mut Self>
    where
        H: EventHandler<T> + 'static,
    {
        let dependencies = self.stages[stage_index].dependencies.clone();
        let barrier = Arc::new(self.sequencer.new_barrier(dependencies));
        let processor =
            BatchEventProcessor::new(Arc::clone(&self.ring_buffer), barrier, event_handler);

        self.stages[stage_index]
            .sequences
            .push(Arc::clone(processor.sequence()));
        self.handles.push(processor.handle());
        self.pending
            .push(Box::new(move |thread_builder: ThreadBuilder| {
                processor.spawn(thread_builder)
            }));

        self.sequencer.set_gating_sequences(self.terminal_sequences());
        Ok(self)
    }

    /// Sequences no other processor waits on
    fn terminal_sequences(&self) -> Vec<Arc<Sequence>> {
        let is_dependency = |sequence: &Arc<Sequence>| {
            self.stages.iter().any(|stage| {
                stage
                    .dependencies
                    .iter()
                    .any(|dependency| Arc::ptr_eq(dependency, sequence))
            })
        };

        self.stages
            .iter()
            .flat_map(|stage| stage.sequences.iter())
            .filter(|sequence| !is_dependency(sequence))
            .cloned()
            .collect()
    }

    /// Spawn one thread per processor
    ///
    /// # Errors
    /// * `AlreadyStarted` if called twice
    /// * Thread creation failures; processors already spawned are halted first
    pub fn start(&mut self) -> Result<()> {
        self.ensure_not_started()?;
        self.started = true;

        for (index, launch) in std::mem::take(&mut self.pending).into_iter().enumerate() {
            let mut thread_builder =
                ThreadBuilder::new().thread_name(format!("{}-{index}", self.thread_name_prefix));
            if let Some(&core) = self.pin_cores.get(index) {
                thread_builder = thread_builder.pin_at_core(core);
            }

            match launch(thread_builder) {
                Ok(running) => self.running.push(running),
                Err(error) => {
                    tracing::error!(%error, processor = index, "failed to start processor");
                    self.halt_running();
                    return Err(error);
                }
            }
        }

        tracing::info!(processors = self.running.len(), "disruptor started");
        Ok(())
    }

    /// Alert every processor and wait for their threads to exit
    ///
    /// Events published but not yet consumed are left in the buffer.
    pub fn halt(&mut self) -> Result<()> {
        let result = self.halt_running();
        tracing::info!(cursor = self.cursor(), "disruptor halted");
        result
    }

    /// Wait until every processor has consumed up to the cursor, then halt
    ///
    /// Producers must have stopped publishing, otherwise this may not return.
    /// Draining stops early once any processor thread has exited, since the
    /// processors behind it can no longer catch up.
    ///
    /// # Errors
    /// Returns `ThreadPanicked` if a processor's handler panicked
    pub fn shutdown(&mut self) -> Result<()> {
        if !self.running.is_empty() {
            let cursor = self.cursor();
            let backoff = Backoff::new();
            while self
                .handles
                .iter()
                .any(|handle| handle.sequence().get() < cursor)
            {
                if let Some(index) = self.running.iter().position(RunningProcessor::is_finished) {
                    tracing::warn!(processor = index, cursor, "processor exited before draining");
                    break;
                }
                backoff.snooze();
            }
        }

        tracing::info!(cursor = self.cursor(), "disruptor drained");
        self.halt()
    }

    fn halt_running(&mut self) -> Result<()> {
        for handle in &self.handles {
            handle.halt();
        }

        let mut result = Ok(());
        for running in self.running.drain(..) {
            if let Err(error) = running.join() {
                tracing::error!(%error, "processor thread failed");
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
        result
    }
}

impl<T> std::fmt::Debug for Disruptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disruptor")
            .field("buffer_size", &self.ring_buffer.capacity())
            .field("sequencer", &self.sequencer)
            .field("processors", &self.handles.len())
            .field("started", &self.started)
            .finish()
    }
}
