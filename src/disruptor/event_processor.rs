//! Event Processor implementation for the Disruptor
//!
//! The batch event processor is the consumer run loop. It waits on a barrier,
//! hands every newly available event to its handler in sequence order, then
//! publishes its own sequence so producers and downstream stages can move on.
//!
//! Lifecycle: `Idle -> Running -> Alerting -> Halted`. Alerting the barrier is
//! the only way to stop a running processor.

use crate::disruptor::{
    DefaultExceptionHandler, DisruptorError, EventHandler, ExceptionHandler, ManagedThread, Result,
    RingBuffer, Sequence, SequenceBarrier, ThreadBuilder,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle state of a batch event processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessorState {
    /// Constructed, `run` not yet called
    Idle = 0,
    /// Inside the run loop
    Running = 1,
    /// The barrier reported an alert; shutdown callbacks are running
    Alerting = 2,
    /// The run loop has exited
    Halted = 3,
}

impl ProcessorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ProcessorState::Idle,
            1 => ProcessorState::Running,
            2 => ProcessorState::Alerting,
            _ => ProcessorState::Halted,
        }
    }
}

/// Clonable control handle for a processor owned by another thread
#[derive(Debug, Clone)]
pub struct ProcessorHandle {
    sequence: Arc<Sequence>,
    barrier: Arc<dyn SequenceBarrier>,
    state: Arc<AtomicU8>,
}

impl ProcessorHandle {
    /// The processor's published sequence, usable as a gating or dependent sequence
    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }

    /// Request shutdown by alerting the processor's barrier
    ///
    /// Idempotent and callable from any thread.
    pub fn halt(&self) {
        self.barrier.alert();
    }

    pub fn state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.state(),
            ProcessorState::Running | ProcessorState::Alerting
        )
    }
}

/// Batch event processor that drains every available sequence per wait
pub struct BatchEventProcessor<T, H> {
    ring_buffer: Arc<RingBuffer<T>>,
    barrier: Arc<dyn SequenceBarrier>,
    event_handler: H,
    exception_handler: Box<dyn ExceptionHandler<T>>,
    sequence: Arc<Sequence>,
    state: Arc<AtomicU8>,
}

impl<T, H> BatchEventProcessor<T, H>
where
    T: Send + Sync,
    H: EventHandler<T>,
{
    /// Create a new batch event processor
    ///
    /// # Arguments
    /// * `ring_buffer` - The buffer the barrier's sequences refer to
    /// * `barrier` - Barrier rooted at the buffer's sequencer
    /// * `event_handler` - Callback invoked once per event
    pub fn new(
        ring_buffer: Arc<RingBuffer<T>>,
        barrier: Arc<dyn SequenceBarrier>,
        event_handler: H,
    ) -> Self {
        Self {
            ring_buffer,
            barrier,
            event_handler,
            exception_handler: Box::new(DefaultExceptionHandler::new()),
            sequence: Arc::new(Sequence::default()),
            state: Arc::new(AtomicU8::new(ProcessorState::Idle as u8)),
        }
    }

    /// Replace the default logging exception handler
    pub fn with_exception_handler<E>(mut self, exception_handler: E) -> Self
    where
        E: ExceptionHandler<T> + 'static,
    {
        self.exception_handler = Box::new(exception_handler);
        self
    }

    /// The processor's published sequence
    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }

    pub fn handle(&self) -> ProcessorHandle {
        ProcessorHandle {
            sequence: Arc::clone(&self.sequence),
            barrier: Arc::clone(&self.barrier),
            state: Arc::clone(&self.state),
        }
    }

    pub fn state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Run the processing loop on the current thread until the barrier is alerted
    ///
    /// # Errors
    /// Returns `ProcessorAlreadyStarted` if the processor has run before
    pub fn run(&mut self) -> Result<()> {
        self.state
            .compare_exchange(
                ProcessorState::Idle as u8,
                ProcessorState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| DisruptorError::ProcessorAlreadyStarted)?;

        tracing::info!(sequence = self.sequence.get(), "event processor started");
        if let Err(error) = self.event_handler.on_start() {
            self.exception_handler.handle_on_start_exception(error);
        }

        let result = self.process_events();

        self.state
            .store(ProcessorState::Alerting as u8, Ordering::Release);
        if let Err(error) = self.event_handler.on_shutdown() {
            self.exception_handler.handle_on_shutdown_exception(error);
        }
        self.state
            .store(ProcessorState::Halted as u8, Ordering::Release);
        tracing::info!(sequence = self.sequence.get(), "event processor halted");

        result
    }

    fn process_events(&mut self) -> Result<()> {
        let mut next_sequence = self.sequence.get() + 1;

        loop {
            let available_sequence = match self.barrier.wait_for(next_sequence) {
                Ok(sequence) => sequence,
                Err(DisruptorError::Alert) => return Ok(()),
                Err(error) => return Err(error),
            };

            for sequence in next_sequence..=available_sequence {
                // SAFETY: the barrier has observed `sequence` as published, and
                // producers cannot wrap onto it until this processor's sequence
                // passes it. Processors sharing a stage must treat events as
                // read-only by convention.
                let event = unsafe { &mut *self.ring_buffer.get_unchecked_mut(sequence) };
                let end_of_batch = sequence == available_sequence;

                if let Err(error) = self.event_handler.on_event(event, sequence, end_of_batch) {
                    self.exception_handler
                        .handle_event_exception(error, sequence, event);
                }
            }

            self.sequence.set(available_sequence);
            next_sequence = available_sequence + 1;
        }
    }
}

impl<T, H> BatchEventProcessor<T, H>
where
    T: Send + Sync + 'static,
    H: EventHandler<T> + 'static,
{
    /// Move the processor onto its own thread and start it
    ///
    /// # Errors
    /// Propagates thread creation failures from [`ThreadBuilder::spawn`]
    pub fn spawn(mut self, thread_builder: ThreadBuilder) -> Result<RunningProcessor> {
        let handle = self.handle();
        let thread = thread_builder.spawn(move || {
            if let Err(error) = self.run() {
                tracing::error!(%error, "event processor terminated with error");
            }
        })?;

        Ok(RunningProcessor {
            handle,
            thread: Some(thread),
        })
    }
}

/// A processor running on a dedicated thread
///
/// Dropping it halts the processor and joins the thread.
#[derive(Debug)]
pub struct RunningProcessor {
    handle: ProcessorHandle,
    thread: Option<ManagedThread>,
}

impl RunningProcessor {
    pub fn handle(&self) -> &ProcessorHandle {
        &self.handle
    }

    /// Request shutdown without waiting for it
    pub fn halt(&self) {
        self.handle.halt();
    }

    /// Whether the processor thread has exited, normally or by panicking
    pub fn is_finished(&self) -> bool {
        !self.thread.as_ref().is_some_and(ManagedThread::is_running)
    }

    /// Wait for the processor thread to exit
    ///
    /// Blocks until another thread halts the processor.
    pub fn join(mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread.join(),
            None => Ok(()),
        }
    }

    /// Request shutdown and wait for the processor thread to exit
    pub fn halt_and_join(self) -> Result<()> {
        self.halt();
        self.join()
    }
}

impl Drop for RunningProcessor {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.handle.halt();
        }
    }
}
