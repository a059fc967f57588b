//! Strategy for queues without a companion state topic

use crate::coordinator::callback::WhenAllProcessed;
use crate::coordinator::error::CoordinatorResult;
use crate::coordinator::strategy::{OwnershipContext, RestoreStrategy};
use crate::partition::api::{PartitionSet, QueueKey};
use std::sync::Arc;

/// Treats every newly owned partition as restored the moment it is added
pub(crate) struct ImmediateRestore;

impl RestoreStrategy for ImmediateRestore {
    fn add_partitions(
        &self,
        context: &Arc<OwnershipContext>,
        queue_key: &QueueKey,
        added: PartitionSet,
        when_all_processed: WhenAllProcessed,
    ) -> CoordinatorResult<()> {
        let mut restored: Vec<_> = added.iter().collect();
        restored.sort();
        for partition in restored {
            context.notify_partition_restored(partition);
        }
        context.notify_all_restored();

        context.subscribe_all(&added, None)?;
        log::debug!("[{}] Subscribed without restore", queue_key);

        when_all_processed();
        Ok(())
    }
}
