//! Restore strategies and the ownership state they share with the service

use crate::consumer::api::{
    ConsumerResult, MirroredConsumer, PartitionedQueueConsumerManager, StartOffsets,
};
use crate::coordinator::callback::{RestoreCallback, WhenAllProcessed};
use crate::coordinator::error::{CoordinatorError, CoordinatorResult};
use crate::partition::api::{with_topic, PartitionSet, QueueKey, TopicPartitionInfo};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Consumers driven by one queue state service
pub struct QueueConsumers {
    /// Consumer of the event topic; owned partitions are projected onto its topic
    pub event_consumer: Arc<dyn PartitionedQueueConsumerManager>,
    /// Consumers mirroring the event consumer's partitions on their own topics
    pub other_consumers: Vec<Arc<dyn MirroredConsumer>>,
    /// Optional listener for restore progress
    pub restore_callback: Option<Arc<dyn RestoreCallback>>,
}

impl QueueConsumers {
    pub fn new(event_consumer: Arc<dyn PartitionedQueueConsumerManager>) -> Self {
        Self {
            event_consumer,
            other_consumers: Vec::new(),
            restore_callback: None,
        }
    }

    pub fn with_other_consumer(mut self, consumer: Arc<dyn MirroredConsumer>) -> Self {
        self.other_consumers.push(consumer);
        self
    }

    pub fn with_restore_callback(mut self, callback: Arc<dyn RestoreCallback>) -> Self {
        self.restore_callback = Some(callback);
        self
    }
}

/// Owned partitions plus the consumers they are applied to
pub(crate) struct OwnershipContext {
    pub(crate) partitions: RwLock<HashMap<QueueKey, PartitionSet>>,
    pub(crate) consumers: QueueConsumers,
}

impl OwnershipContext {
    pub(crate) fn new(consumers: QueueConsumers) -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            consumers,
        }
    }

    pub(crate) fn event_consumer(&self) -> &dyn PartitionedQueueConsumerManager {
        self.consumers.event_consumer.as_ref()
    }

    pub(crate) fn event_topic(&self) -> &str {
        self.consumers.event_consumer.topic()
    }

    pub(crate) fn notify_partition_restored(&self, partition: &TopicPartitionInfo) {
        if let Some(callback) = &self.consumers.restore_callback {
            callback.on_partition_restored(partition);
        }
    }

    pub(crate) fn notify_all_restored(&self) {
        if let Some(callback) = &self.consumers.restore_callback {
            callback.on_all_partitions_restored();
        }
    }

    /// Subscribe the event consumer and every mirrored consumer
    ///
    /// Every consumer is attempted; the first failure is returned.
    pub(crate) fn subscribe_all(
        &self,
        event_partitions: &PartitionSet,
        start_offsets: Option<Arc<StartOffsets>>,
    ) -> CoordinatorResult<()> {
        let event_result =
            self.event_consumer()
                .add_partitions_with(event_partitions, None, start_offsets);
        let mirror_result = for_each_consumer(&self.consumers.other_consumers, |consumer| {
            consumer.add_partitions(&with_topic(event_partitions, consumer.topic()))
        });
        event_result?;
        mirror_result
    }

    /// Unsubscribe the event consumer and every mirrored consumer
    pub(crate) fn unsubscribe_all(&self, event_partitions: &PartitionSet) -> CoordinatorResult<()> {
        let event_result = self.event_consumer().remove_partitions(event_partitions);
        let mirror_result = for_each_consumer(&self.consumers.other_consumers, |consumer| {
            consumer.remove_partitions(&with_topic(event_partitions, consumer.topic()))
        });
        event_result?;
        mirror_result
    }

    /// Delete partitions from the event consumer and every mirrored consumer
    pub(crate) fn delete_all(&self, event_partitions: &PartitionSet) -> CoordinatorResult<()> {
        let event_result = self.event_consumer().delete(event_partitions);
        let mirror_result = for_each_consumer(&self.consumers.other_consumers, |consumer| {
            consumer.delete(&with_topic(event_partitions, consumer.topic()))
        });
        event_result?;
        mirror_result
    }
}

/// Apply `op` to every consumer, returning the first failure
pub(crate) fn for_each_consumer<C, F>(consumers: &[C], mut op: F) -> CoordinatorResult<()>
where
    F: FnMut(&C) -> ConsumerResult<()>,
{
    let mut first_error: Option<CoordinatorError> = None;
    for consumer in consumers {
        if let Err(e) = op(consumer) {
            match first_error {
                Some(_) => log::warn!("Additional consumer failure: {}", e),
                None => first_error = Some(e.into()),
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// How newly owned partitions are brought into service
pub(crate) trait RestoreStrategy: Send + Sync {
    fn add_partitions(
        &self,
        context: &Arc<OwnershipContext>,
        queue_key: &QueueKey,
        added: PartitionSet,
        when_all_processed: WhenAllProcessed,
    ) -> CoordinatorResult<()>;

    /// Extra unsubscription beyond the event and mirrored consumers
    fn remove_partitions(&self, _removed: &PartitionSet) -> CoordinatorResult<()> {
        Ok(())
    }

    /// Extra deletion beyond the event and mirrored consumers
    fn delete_partitions(&self, _deleted: &PartitionSet) -> CoordinatorResult<()> {
        Ok(())
    }

    /// Stop consumers owned by the strategy, after the event consumer stopped
    fn stop(&self) {}

    fn partitions_in_progress(&self) -> PartitionSet {
        PartitionSet::new()
    }
}
