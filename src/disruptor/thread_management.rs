//! Thread management and CPU affinity for processor threads
//!
//! Processor threads get a name and can optionally be pinned to a CPU core.

use crate::disruptor::{DisruptorError, Result};
use core_affinity::CoreId;
use std::thread::{self, JoinHandle};

/// Builder for a named, optionally pinned, processor thread
#[derive(Debug, Clone, Default)]
pub struct ThreadBuilder {
    name: Option<String>,
    affinity: Option<usize>,
}

impl ThreadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the thread to the given CPU core
    ///
    /// The core is validated when the thread is spawned.
    pub fn pin_at_core(mut self, core_id: usize) -> Self {
        self.affinity = Some(core_id);
        self
    }

    /// Set thread name
    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Spawn a thread with the configured settings
    ///
    /// # Errors
    /// * `InvalidConfig` if the requested core does not exist on this machine
    /// * `ThreadSpawn` if the OS refuses to create the thread
    pub fn spawn<F>(self, f: F) -> Result<ManagedThread>
    where
        F: FnOnce() + Send + 'static,
    {
        let thread_name = self.name.unwrap_or_else(|| "seqring-processor".to_string());
        let core = self.affinity.map(validate_core_id).transpose()?;

        let name_for_closure = thread_name.clone();
        let join_handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                if let Some(core) = core {
                    if !core_affinity::set_for_current(core) {
                        tracing::warn!(thread = %name_for_closure, core = core.id, "failed to pin thread");
                    }
                }
                f();
            })
            .map_err(|e| DisruptorError::ThreadSpawn(e.to_string()))?;

        Ok(ManagedThread {
            join_handle: Some(join_handle),
            thread_name,
        })
    }
}

fn validate_core_id(core_id: usize) -> Result<CoreId> {
    let available_cores = core_affinity::get_core_ids().unwrap_or_default();
    available_cores
        .into_iter()
        .find(|core| core.id == core_id)
        .ok_or_else(|| DisruptorError::InvalidConfig(format!("CPU core {core_id} is not available")))
}

/// Join handle for a processor thread
///
/// Dropping an unjoined `ManagedThread` joins it.
#[derive(Debug)]
pub struct ManagedThread {
    join_handle: Option<JoinHandle<()>>,
    thread_name: String,
}

impl ManagedThread {
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Wait for the thread to finish
    ///
    /// # Errors
    /// Returns `ThreadPanicked` if the thread panicked
    pub fn join(mut self) -> Result<()> {
        match self.join_handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| DisruptorError::ThreadPanicked(self.thread_name.clone())),
            None => Ok(()),
        }
    }

    /// Check if the thread is still running
    pub fn is_running(&self) -> bool {
        self.join_handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ManagedThread {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}
