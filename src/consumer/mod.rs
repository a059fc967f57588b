//! Per-topic consumer managers
//!
//! A consumer manager owns the broker subscriptions of one physical topic.
//! The queue state coordinator drives managers through two contracts:
//!
//! - [`MirroredConsumer`] - the narrow add/remove/delete capability every
//!   consumer shares, used for consumers that simply mirror the event
//!   consumer's partitions onto their own topic
//! - [`PartitionedQueueConsumerManager`] - the full contract of the event and
//!   state consumers, adding restore-aware subscription and stop/await
//!
//! [`InMemoryConsumerManager`] implements both without a broker. It backs the
//! `simulate` command and the coordinator tests.

pub mod api;
mod error;
mod memory;
mod traits;

pub use error::{ConsumerError, ConsumerResult};
pub use memory::{ConsumerCall, InMemoryConsumerManager, RestoreMode};
pub use traits::{
    MirroredConsumer, OnPartitionRestored, PartitionedQueueConsumerManager, StartOffsets,
    StartOffsetsProvider,
};

#[cfg(test)]
mod tests;
