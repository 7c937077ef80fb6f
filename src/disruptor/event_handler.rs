//! Event Handler Implementation
//!
//! The consumer-side callback a [`BatchEventProcessor`] drives over every
//! published event.
//!
//! [`BatchEventProcessor`]: crate::disruptor::BatchEventProcessor

use crate::disruptor::Result;

/// Handler for processing events from the Disruptor
///
/// Runs on the processor's only thread, so it must not block indefinitely, and
/// it must not keep the event reference past the call.
///
/// # Examples
/// ```
/// use seqring::disruptor::{EventHandler, Result};
///
/// #[derive(Default)]
/// struct Tick {
///     price: u64,
/// }
///
/// struct SumHandler {
///     total: u64,
/// }
///
/// impl EventHandler<Tick> for SumHandler {
///     fn on_event(&mut self, event: &mut Tick, _sequence: i64, end_of_batch: bool) -> Result<()> {
///         self.total += event.price;
///         if end_of_batch {
///             // flush downstream
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait EventHandler<T>: Send {
    /// Process one event
    ///
    /// # Arguments
    /// * `event` - The event stored at `sequence`
    /// * `sequence` - The sequence number of the event
    /// * `end_of_batch` - True for the last event of the currently available batch
    ///
    /// # Errors
    /// Errors are passed to the processor's exception handler; the event still
    /// counts as processed.
    fn on_event(&mut self, event: &mut T, sequence: i64, end_of_batch: bool) -> Result<()>;

    /// Called once on the processor thread before the first event
    fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once on the processor thread after it halts
    fn on_shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// An event handler created from a closure
pub struct ClosureEventHandler<T, F>
where
    F: FnMut(&mut T, i64, bool) + Send,
{
    handler: F,
    _phantom: std::marker::PhantomData<fn(&mut T)>,
}

impl<T, F> ClosureEventHandler<T, F>
where
    F: FnMut(&mut T, i64, bool) + Send,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> EventHandler<T> for ClosureEventHandler<T, F>
where
    F: FnMut(&mut T, i64, bool) + Send,
{
    fn on_event(&mut self, event: &mut T, sequence: i64, end_of_batch: bool) -> Result<()> {
        (self.handler)(event, sequence, end_of_batch);
        Ok(())
    }
}
