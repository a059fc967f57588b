//! Public API for consumer managers
//!
//! External modules should import from here rather than directly from internal modules.

// Contracts
pub use crate::consumer::traits::{
    MirroredConsumer, OnPartitionRestored, PartitionedQueueConsumerManager, StartOffsets,
    StartOffsetsProvider,
};

// In-memory implementation
pub use crate::consumer::memory::{ConsumerCall, InMemoryConsumerManager, RestoreMode};

// Error handling
pub use crate::consumer::error::{ConsumerError, ConsumerResult};
