//! Producer Type Implementation
//!
//! Selects which sequencer coordinates the producer side of a Disruptor.

use crate::disruptor::{
    MultiProducerSequencer, Result, Sequencer, SingleProducerSequencer, WaitStrategy,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Specifies the type of producer for the Disruptor
///
/// # Examples
/// ```
/// use seqring::disruptor::ProducerType;
///
/// assert!(ProducerType::Single.is_single());
/// assert!(ProducerType::Multi.is_multi());
/// assert_eq!(ProducerType::default(), ProducerType::Single);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducerType {
    /// Exactly one thread publishes. Claims need no atomic read-modify-write.
    #[default]
    Single,

    /// Any number of threads publish concurrently
    Multi,
}

impl ProducerType {
    pub fn is_single(&self) -> bool {
        matches!(self, ProducerType::Single)
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, ProducerType::Multi)
    }

    /// Build the sequencer matching this producer type
    ///
    /// # Errors
    /// Returns `InvalidBufferSize` if `buffer_size` is not a power of 2
    pub fn create_sequencer(
        &self,
        buffer_size: usize,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Result<Arc<dyn Sequencer>> {
        Ok(match self {
            ProducerType::Single => {
                Arc::new(SingleProducerSequencer::new(buffer_size, wait_strategy)?)
            }
            ProducerType::Multi => Arc::new(MultiProducerSequencer::new(buffer_size, wait_strategy)?),
        })
    }
}

impl std::fmt::Display for ProducerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProducerType::Single => write!(f, "single"),
            ProducerType::Multi => write!(f, "multi"),
        }
    }
}
