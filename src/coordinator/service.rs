//! QueueStateService - applies ownership changes to consumer managers

use crate::consumer::api::{PartitionedQueueConsumerManager, StartOffsetsProvider};
use crate::coordinator::callback::WhenAllProcessed;
use crate::coordinator::default_strategy::ImmediateRestore;
use crate::coordinator::describe_partitions;
use crate::coordinator::error::{CoordinatorError, CoordinatorResult};
use crate::coordinator::kafka_strategy::TwoPhaseRestore;
use crate::coordinator::strategy::{OwnershipContext, QueueConsumers, RestoreStrategy};
use crate::core::sync::{handle_rwlock_read, handle_rwlock_write};
use crate::partition::api::{with_topic, PartitionSet, QueueKey};
use std::collections::HashMap;
use std::sync::Arc;

/// Tracks which partitions this node owns per queue and keeps the consumer
/// managers subscribed accordingly
///
/// Ownership changes arrive through [`update`](Self::update) from a single
/// dispatch thread. Removed partitions are unsubscribed from every consumer
/// immediately; added partitions go through the restore strategy chosen at
/// construction:
///
/// - [`new_default`](Self::new_default) subscribes added partitions right away
/// - [`new_kafka`](Self::new_kafka) first restores each partition from the
///   state topic and subscribes the event consumer per partition as each
///   restore completes
///
/// # Locking
///
/// The partitions map sits behind one `RwLock`. `update()` and `delete()`
/// hold the writer lock only while diffing and replacing entries, never
/// across a consumer manager call. Restore completions take the reader lock
/// to re-check ownership.
///
/// # Example
///
/// ```rust
/// use queuestate::consumer::api::InMemoryConsumerManager;
/// use queuestate::coordinator::api::{QueueConsumers, QueueStateService};
/// use queuestate::partition::api::{PartitionSet, QueueKey, ServiceType, TopicPartitionInfo};
/// use std::sync::Arc;
///
/// let events = Arc::new(InMemoryConsumerManager::manual("tb_core"));
/// let service = QueueStateService::new_default(QueueConsumers::new(events.clone()));
///
/// let key = QueueKey::new(ServiceType::TbCore);
/// let owned: PartitionSet = (0..2).map(|p| TopicPartitionInfo::new("tb_core", p)).collect();
/// service.update(key.clone(), &owned, || {}).unwrap();
///
/// assert_eq!(service.partitions_for(&key).unwrap(), owned);
/// assert_eq!(events.subscribed(), owned);
/// ```
pub struct QueueStateService {
    context: Arc<OwnershipContext>,
    strategy: Box<dyn RestoreStrategy>,
}

impl QueueStateService {
    fn with_strategy(consumers: QueueConsumers, strategy: Box<dyn RestoreStrategy>) -> Self {
        Self {
            context: Arc::new(OwnershipContext::new(consumers)),
            strategy,
        }
    }

    /// Service for queues without a companion state topic
    pub fn new_default(consumers: QueueConsumers) -> Self {
        Self::with_strategy(consumers, Box::new(ImmediateRestore))
    }

    /// Service that restores partition state from `state_consumer` before
    /// consuming events
    ///
    /// `events_start_offsets` is sampled once per batch of added partitions,
    /// before the state subscription, and its offsets are used as the event
    /// start positions for that batch.
    pub fn new_kafka(
        consumers: QueueConsumers,
        state_consumer: Arc<dyn PartitionedQueueConsumerManager>,
        events_start_offsets: Option<StartOffsetsProvider>,
    ) -> Self {
        Self::with_strategy(
            consumers,
            Box::new(TwoPhaseRestore::new(state_consumer, events_start_offsets)),
        )
    }

    /// Topic owned partitions are projected onto
    pub fn event_topic(&self) -> &str {
        self.context.event_topic()
    }

    /// Apply an ownership-change notification for `queue_key`
    ///
    /// `new_partitions` is the complete set of partitions the node now owns
    /// for the queue, on any topic; it is projected onto the event topic.
    /// `when_all_processed` runs exactly once after a successful call: right
    /// away if nothing was added, otherwise once every added partition has
    /// been brought into service (possibly later, on a consumer thread).
    /// It is dropped without running if the call returns an error.
    pub fn update<F>(
        &self,
        queue_key: QueueKey,
        new_partitions: &PartitionSet,
        when_all_processed: F,
    ) -> CoordinatorResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let new_partitions = with_topic(new_partitions, self.event_topic());

        let (added, removed) = {
            let mut partitions =
                handle_rwlock_write(self.context.partitions.write(), CoordinatorError::lock_poisoned)?;

            let empty = PartitionSet::new();
            let old_partitions = partitions.get(&queue_key).unwrap_or(&empty);
            let added: PartitionSet = new_partitions.difference(old_partitions).cloned().collect();
            let removed: PartitionSet = old_partitions.difference(&new_partitions).cloned().collect();

            // Upstream discovery assigns each partition to one queue only
            if let Some((owner, partition)) = partitions
                .iter()
                .filter(|(key, _)| **key != queue_key)
                .find_map(|(key, owned)| {
                    added
                        .iter()
                        .find(|partition| owned.contains(*partition))
                        .map(|partition| (key, partition))
                })
            {
                return Err(CoordinatorError::OverlappingOwnership {
                    queue_key: queue_key.to_string(),
                    partition: partition.to_string(),
                    owner: owner.to_string(),
                });
            }

            partitions.insert(queue_key.clone(), new_partitions);
            (added, removed)
        };
        log::trace!(
            "[{}] Ownership diff: added {}, removed {}",
            queue_key,
            added.len(),
            removed.len()
        );

        if !removed.is_empty() {
            self.remove_partitions(&queue_key, &removed)?;
        }

        if added.is_empty() {
            when_all_processed();
        } else {
            self.add_partitions(&queue_key, added, Box::new(when_all_processed))?;
        }
        Ok(())
    }

    fn add_partitions(
        &self,
        queue_key: &QueueKey,
        added: PartitionSet,
        when_all_processed: WhenAllProcessed,
    ) -> CoordinatorResult<()> {
        log::info!(
            "[{}] Added partitions: {}",
            queue_key,
            describe_partitions(&added)
        );
        self.strategy
            .add_partitions(&self.context, queue_key, added, when_all_processed)
    }

    fn remove_partitions(&self, queue_key: &QueueKey, removed: &PartitionSet) -> CoordinatorResult<()> {
        log::info!(
            "[{}] Removed partitions: {}",
            queue_key,
            describe_partitions(removed)
        );
        let consumers_result = self.context.unsubscribe_all(removed);
        let strategy_result = self.strategy.remove_partitions(removed);
        consumers_result?;
        strategy_result
    }

    /// Permanently decommission `partitions`
    ///
    /// Removes them from every tracked queue and tells every consumer
    /// manager to forget their committed offsets and state. Queues left with
    /// no partitions are dropped from the map.
    pub fn delete(&self, partitions: &PartitionSet) -> CoordinatorResult<()> {
        let deleted = with_topic(partitions, self.event_topic());
        {
            let mut owned =
                handle_rwlock_write(self.context.partitions.write(), CoordinatorError::lock_poisoned)?;
            for queue_partitions in owned.values_mut() {
                queue_partitions.retain(|partition| !deleted.contains(partition));
            }
            owned.retain(|_, queue_partitions| !queue_partitions.is_empty());
        }
        self.delete_partitions(&deleted)
    }

    fn delete_partitions(&self, deleted: &PartitionSet) -> CoordinatorResult<()> {
        log::info!("Deleting partitions: {}", describe_partitions(deleted));
        let consumers_result = self.context.delete_all(deleted);
        let strategy_result = self.strategy.delete_partitions(deleted);
        consumers_result?;
        strategy_result
    }

    /// Stop the event consumer, then any strategy-owned consumer, blocking
    /// until each has fully stopped
    pub fn stop(&self) {
        let event_consumer = self.context.event_consumer();
        event_consumer.stop();
        event_consumer.await_stop();
        self.strategy.stop();
        log::debug!("Queue state service for {} stopped", self.event_topic());
    }

    /// Snapshot of the owned partitions per queue
    pub fn partitions(&self) -> CoordinatorResult<HashMap<QueueKey, PartitionSet>> {
        let partitions =
            handle_rwlock_read(self.context.partitions.read(), CoordinatorError::lock_poisoned)?;
        Ok(partitions.clone())
    }

    /// Snapshot of the partitions owned for one queue
    pub fn partitions_for(&self, queue_key: &QueueKey) -> CoordinatorResult<PartitionSet> {
        let partitions =
            handle_rwlock_read(self.context.partitions.read(), CoordinatorError::lock_poisoned)?;
        Ok(partitions.get(queue_key).cloned().unwrap_or_default())
    }

    /// State-topic partitions whose restore has not completed yet
    pub fn partitions_in_progress(&self) -> PartitionSet {
        self.strategy.partitions_in_progress()
    }
}
