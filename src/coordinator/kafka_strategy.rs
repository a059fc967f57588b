//! Two-phase strategy: restore partition state, then consume events
//!
//! For each batch of newly owned partitions:
//!
//! 1. the event start offsets are snapshotted before anything else, since the
//!    restore can take arbitrarily long
//! 2. the partitions, projected onto the state topic, are marked in progress
//!    and handed to the state consumer with a per-partition restore callback
//! 3. when a partition's state has caught up, the callback re-checks under
//!    the reader lock that the queue still owns the partition and only then
//!    subscribes the event and mirrored consumers to it
//!
//! Completion is tracked per partition so a slow partition never delays its
//! caught-up siblings.

use crate::consumer::api::{
    OnPartitionRestored, PartitionedQueueConsumerManager, StartOffsets, StartOffsetsProvider,
};
use crate::coordinator::callback::WhenAllProcessed;
use crate::coordinator::error::{CoordinatorError, CoordinatorResult};
use crate::coordinator::in_progress::PartitionsInProgress;
use crate::coordinator::strategy::{OwnershipContext, RestoreStrategy};
use crate::coordinator::describe_partitions;
use crate::core::sync::handle_rwlock_read;
use crate::partition::api::{with_topic, PartitionSet, QueueKey, TopicPartitionInfo};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub(crate) struct TwoPhaseRestore {
    state_consumer: Arc<dyn PartitionedQueueConsumerManager>,
    events_start_offsets: Option<StartOffsetsProvider>,
    in_progress: Arc<PartitionsInProgress>,
}

impl TwoPhaseRestore {
    pub(crate) fn new(
        state_consumer: Arc<dyn PartitionedQueueConsumerManager>,
        events_start_offsets: Option<StartOffsetsProvider>,
    ) -> Self {
        Self {
            state_consumer,
            events_start_offsets,
            in_progress: Arc::new(PartitionsInProgress::new()),
        }
    }

    fn state_topic(&self) -> &str {
        self.state_consumer.topic()
    }
}

/// Runs a batch's continuation once all of its partitions have settled
struct RestoreBatch {
    remaining: AtomicUsize,
    when_all_processed: Mutex<Option<WhenAllProcessed>>,
}

impl RestoreBatch {
    fn new(size: usize, when_all_processed: WhenAllProcessed) -> Self {
        Self {
            remaining: AtomicUsize::new(size),
            when_all_processed: Mutex::new(Some(when_all_processed)),
        }
    }

    fn partition_settled(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let when_all_processed = self
            .when_all_processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(when_all_processed) = when_all_processed {
            when_all_processed();
        }
    }
}

impl RestoreStrategy for TwoPhaseRestore {
    fn add_partitions(
        &self,
        context: &Arc<OwnershipContext>,
        queue_key: &QueueKey,
        added: PartitionSet,
        when_all_processed: WhenAllProcessed,
    ) -> CoordinatorResult<()> {
        // Must precede the state subscription
        let start_offsets = self
            .events_start_offsets
            .as_ref()
            .map(|provider| Arc::new(provider()));

        let to_restore = with_topic(&added, self.state_topic());
        self.in_progress.add_all(&to_restore);
        let batch = Arc::new(RestoreBatch::new(to_restore.len(), when_all_processed));

        let on_restored: OnPartitionRestored = {
            let context = Arc::clone(context);
            let in_progress = Arc::clone(&self.in_progress);
            let queue_key = queue_key.clone();
            Arc::new(move |state_partition| {
                on_state_restored(
                    &context,
                    &in_progress,
                    &queue_key,
                    state_partition,
                    start_offsets.clone(),
                );
                batch.partition_settled();
            })
        };

        log::info!(
            "[{}] Restoring state for partitions: {}",
            queue_key,
            describe_partitions(&to_restore)
        );
        if let Err(e) = self
            .state_consumer
            .add_partitions_with(&to_restore, Some(on_restored), None)
        {
            self.in_progress.withdraw_all(&to_restore);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove_partitions(&self, removed: &PartitionSet) -> CoordinatorResult<()> {
        self.state_consumer
            .remove_partitions(&with_topic(removed, self.state_topic()))?;
        Ok(())
    }

    fn delete_partitions(&self, deleted: &PartitionSet) -> CoordinatorResult<()> {
        self.state_consumer
            .delete(&with_topic(deleted, self.state_topic()))?;
        Ok(())
    }

    fn stop(&self) {
        self.state_consumer.stop();
        self.state_consumer.await_stop();
    }

    fn partitions_in_progress(&self) -> PartitionSet {
        self.in_progress.snapshot()
    }
}

/// Handle one state partition catching up
///
/// The reader lock on the partitions map is taken before the in-progress
/// bookkeeping and held through the event subscription, so an `update()` for
/// any queue key waits on a slow event or mirrored consumer while this runs.
/// Only the last outstanding restore of a partition subscribes its events;
/// a completion for a request that was superseded by a re-add does not.
fn on_state_restored(
    context: &OwnershipContext,
    in_progress: &PartitionsInProgress,
    queue_key: &QueueKey,
    state_partition: TopicPartitionInfo,
    start_offsets: Option<Arc<StartOffsets>>,
) {
    let owned = handle_rwlock_read(context.partitions.read(), CoordinatorError::lock_poisoned);

    let completion = in_progress.complete(&state_partition);
    log::info!("[{}] Restored state for {}", queue_key, state_partition);
    context.notify_partition_restored(&state_partition);
    if completion.is_some_and(|c| c.remaining == 0) {
        log::info!("[{}] All state partitions restored", queue_key);
        context.notify_all_restored();
    }

    if completion.is_some_and(|c| c.partition_pending) {
        log::debug!(
            "[{}] Partition {} has a newer restore pending, not consuming its events yet",
            queue_key,
            state_partition
        );
        return;
    }

    let owned = match owned {
        Ok(owned) => owned,
        Err(e) => {
            log::error!(
                "[{}] Skipping event subscription for {}: {}",
                queue_key,
                state_partition,
                e
            );
            return;
        }
    };

    let event_partition = state_partition.with_topic(context.event_topic());
    let still_owned = owned
        .get(queue_key)
        .is_some_and(|partitions| partitions.contains(&event_partition));
    if !still_owned {
        log::debug!(
            "[{}] Partition {} no longer owned, not consuming its events",
            queue_key,
            event_partition
        );
        return;
    }

    let single = PartitionSet::from([event_partition]);
    match context.subscribe_all(&single, start_offsets) {
        Ok(()) => log::info!(
            "[{}] Consuming events for {}",
            queue_key,
            describe_partitions(&single)
        ),
        Err(e) => log::error!(
            "[{}] Failed to subscribe to events for {}: {}",
            queue_key,
            describe_partitions(&single),
            e
        ),
    }
    drop(owned);
}
