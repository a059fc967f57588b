//! Consumer manager contracts
//!
//! The coordinator never talks to a broker directly. It drives one consumer
//! manager per physical topic through these traits.

use crate::consumer::error::ConsumerResult;
use crate::partition::api::{PartitionSet, TopicPartitionInfo};
use std::collections::HashMap;
use std::sync::Arc;

/// Start offsets keyed by full topic name (`<topic>.<partition>`)
pub type StartOffsets = HashMap<String, i64>;

/// Supplies the current event start offsets on demand
pub type StartOffsetsProvider = Arc<dyn Fn() -> StartOffsets + Send + Sync>;

/// Invoked once per partition when its state stream has caught up
pub type OnPartitionRestored = Arc<dyn Fn(TopicPartitionInfo) + Send + Sync>;

/// Narrow capability of a consumer that mirrors another consumer's partitions
///
/// Mirrored consumers only follow subscription changes; they have no restore
/// phase and are not stopped by the coordinator.
pub trait MirroredConsumer: Send + Sync {
    /// Topic this consumer subscribes to
    fn topic(&self) -> &str;

    /// Subscribe to `partitions`
    fn add_partitions(&self, partitions: &PartitionSet) -> ConsumerResult<()>;

    /// Unsubscribe from `partitions`, keeping committed offsets
    fn remove_partitions(&self, partitions: &PartitionSet) -> ConsumerResult<()>;

    /// Unsubscribe from `partitions` and forget committed offsets and state
    fn delete(&self, partitions: &PartitionSet) -> ConsumerResult<()>;
}

/// Owner of the broker subscriptions for one physical topic
///
/// # Restore contract
///
/// When [`add_partitions_with`](Self::add_partitions_with) is given an
/// `on_restored` callback, the manager must invoke it exactly once for every
/// partition in the request, from its own threads, once that partition has
/// been read up to its tail. This holds even if the partition is removed
/// before it catches up.
pub trait PartitionedQueueConsumerManager: MirroredConsumer {
    /// Subscribe to `partitions`, optionally reporting restore progress and
    /// starting from the given offsets
    ///
    /// Partitions absent from `start_offsets` start from the committed offset.
    fn add_partitions_with(
        &self,
        partitions: &PartitionSet,
        on_restored: Option<OnPartitionRestored>,
        start_offsets: Option<Arc<StartOffsets>>,
    ) -> ConsumerResult<()>;

    /// Signal the manager to stop consuming
    fn stop(&self);

    /// Block until the manager has fully stopped
    fn await_stop(&self);
}
