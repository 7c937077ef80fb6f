//! Disruptor Configuration
//!
//! Serializable settings for building a [`Disruptor`]: buffer capacity, producer
//! type, wait strategy and processor thread layout.
//!
//! [`Disruptor`]: crate::disruptor::Disruptor

use crate::disruptor::{
    is_power_of_two, BlockingWaitStrategy, BusySpinWaitStrategy, DisruptorError, ProducerType,
    Result, SleepingWaitStrategy, WaitStrategy, YieldingWaitStrategy,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Wait strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaitStrategyKind {
    BusySpin,
    Yielding {
        #[serde(default = "default_spin_tries")]
        spin_tries: u32,
    },
    Sleeping {
        #[serde(default = "default_retries")]
        retries: u32,
        #[serde(default = "default_sleep_nanos")]
        sleep_nanos: u64,
    },
    #[default]
    Blocking,
}

fn default_spin_tries() -> u32 {
    YieldingWaitStrategy::DEFAULT_SPIN_TRIES
}

fn default_retries() -> u32 {
    SleepingWaitStrategy::DEFAULT_RETRIES
}

fn default_sleep_nanos() -> u64 {
    SleepingWaitStrategy::DEFAULT_SLEEP.as_nanos() as u64
}

impl WaitStrategyKind {
    /// Construct the configured strategy
    pub fn build(&self) -> Arc<dyn WaitStrategy> {
        match *self {
            WaitStrategyKind::BusySpin => Arc::new(BusySpinWaitStrategy::new()),
            WaitStrategyKind::Yielding { spin_tries } => {
                Arc::new(YieldingWaitStrategy::with_spin_tries(spin_tries))
            }
            WaitStrategyKind::Sleeping {
                retries,
                sleep_nanos,
            } => Arc::new(SleepingWaitStrategy::new_with_retries(
                retries,
                Duration::from_nanos(sleep_nanos),
            )),
            WaitStrategyKind::Blocking => Arc::new(BlockingWaitStrategy::new()),
        }
    }
}

/// Main disruptor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisruptorConfig {
    /// Ring buffer capacity, must be a power of 2
    pub buffer_size: usize,

    pub producer_type: ProducerType,

    /// Strategy every barrier uses to wait for sequences
    pub wait_strategy: WaitStrategyKind,

    /// Processor threads are named `{prefix}-{index}`
    pub thread_name_prefix: String,

    /// CPU cores assigned to processors in the order they are added.
    /// Processors beyond the end of the list are not pinned.
    pub pin_cores: Vec<usize>,
}

impl Default for DisruptorConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            producer_type: ProducerType::Single,
            wait_strategy: WaitStrategyKind::Blocking,
            thread_name_prefix: "seqring".to_string(),
            pin_cores: Vec::new(),
        }
    }
}

impl DisruptorConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_producer_type(mut self, producer_type: ProducerType) -> Self {
        self.producer_type = producer_type;
        self
    }

    pub fn with_wait_strategy(mut self, wait_strategy: WaitStrategyKind) -> Self {
        self.wait_strategy = wait_strategy;
        self
    }

    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_pin_cores(mut self, cores: Vec<usize>) -> Self {
        self.pin_cores = cores;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !is_power_of_two(self.buffer_size) {
            return Err(DisruptorError::InvalidBufferSize(self.buffer_size));
        }

        if self.thread_name_prefix.is_empty() {
            return Err(DisruptorError::InvalidConfig(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }

        if let WaitStrategyKind::Sleeping { sleep_nanos: 0, .. } = self.wait_strategy {
            return Err(DisruptorError::InvalidConfig(
                "sleeping wait strategy needs a non-zero sleep_nanos".to_string(),
            ));
        }

        let mut cores = self.pin_cores.clone();
        cores.sort_unstable();
        if cores.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(DisruptorError::InvalidConfig(
                "pin_cores must not repeat a core".to_string(),
            ));
        }

        Ok(())
    }
}
