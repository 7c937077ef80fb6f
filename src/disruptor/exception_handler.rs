//! Exception Handler Implementation
//!
//! Exception handlers receive the errors returned by event handlers. The batch
//! processor never retries or skips an event because of an error; what happens
//! next is up to the exception handler.

use crate::disruptor::DisruptorError;

/// Handler for errors raised while processing events
pub trait ExceptionHandler<T>: Send {
    /// Handle an error returned by `on_event` for the event at `sequence`
    fn handle_event_exception(&self, error: DisruptorError, sequence: i64, event: &T);

    /// Handle an error returned by `on_start`
    fn handle_on_start_exception(&self, error: DisruptorError);

    /// Handle an error returned by `on_shutdown`
    fn handle_on_shutdown_exception(&self, error: DisruptorError);
}

/// Default exception handler that logs errors and keeps processing
#[derive(Debug, Default)]
pub struct DefaultExceptionHandler;

impl DefaultExceptionHandler {
    pub fn new() -> Self {
        Self
    }
}

impl<T> ExceptionHandler<T> for DefaultExceptionHandler {
    fn handle_event_exception(&self, error: DisruptorError, sequence: i64, _event: &T) {
        tracing::error!(sequence, %error, "event handler failed");
    }

    fn handle_on_start_exception(&self, error: DisruptorError) {
        tracing::error!(%error, "event handler failed on start");
    }

    fn handle_on_shutdown_exception(&self, error: DisruptorError) {
        tracing::error!(%error, "event handler failed on shutdown");
    }
}
