//! Restore progress notifications

use crate::partition::api::TopicPartitionInfo;

/// Listener for state restore progress
///
/// `on_partition_restored` fires once per state-topic partition as it catches
/// up. `on_all_partitions_restored` fires each time the set of partitions
/// being restored drains to empty. Both may be called from consumer manager
/// threads.
pub trait RestoreCallback: Send + Sync {
    fn on_partition_restored(&self, partition: &TopicPartitionInfo);

    fn on_all_partitions_restored(&self);
}

/// Continuation run once the partitions added by one `update()` are settled
pub type WhenAllProcessed = Box<dyn FnOnce() + Send>;
