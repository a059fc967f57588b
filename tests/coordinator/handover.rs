//! Partitions moving between queues and between nodes

use crate::common::{partitions, EVENT_TOPIC};
use queuestate::consumer::api::{ConsumerCall, InMemoryConsumerManager};
use queuestate::coordinator::api::{CoordinatorError, QueueConsumers, QueueStateService};
use queuestate::partition::api::{PartitionSet, QueueKey, ServiceType, TenantId, TopicPartitionInfo};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Node {
    events: Arc<InMemoryConsumerManager>,
    service: QueueStateService,
}

fn node() -> Node {
    let events = Arc::new(InMemoryConsumerManager::manual(EVENT_TOPIC));
    let service = QueueStateService::new_default(QueueConsumers::new(events.clone()));
    Node { events, service }
}

#[test]
fn test_partition_moves_between_nodes() {
    let key = QueueKey::new(ServiceType::TbRuleEngine);
    let node_a = node();
    let node_b = node();

    node_a.service.update(key.clone(), &partitions(EVENT_TOPIC, &[0, 1, 2, 3]), || {}).unwrap();
    node_b.service.update(key.clone(), &PartitionSet::new(), || {}).unwrap();

    // Rebalance: node B takes partitions 2 and 3
    node_a.service.update(key.clone(), &partitions(EVENT_TOPIC, &[0, 1]), || {}).unwrap();
    node_b.service.update(key.clone(), &partitions(EVENT_TOPIC, &[2, 3]), || {}).unwrap();

    assert_eq!(node_a.events.subscribed(), partitions(EVENT_TOPIC, &[0, 1]));
    assert_eq!(node_b.events.subscribed(), partitions(EVENT_TOPIC, &[2, 3]));
    assert!(matches!(
        node_a.events.calls().last(),
        Some(ConsumerCall::Remove { partitions: removed }) if removed == &partitions(EVENT_TOPIC, &[2, 3])
    ));
}

#[test]
fn test_partition_moves_between_queues_in_two_notifications() {
    let main = QueueKey::new(ServiceType::TbRuleEngine);
    let high_priority = QueueKey::new(ServiceType::TbRuleEngine).with_queue_name("HighPriority");
    let node = node();

    node.service.update(main.clone(), &partitions(EVENT_TOPIC, &[0, 1]), || {}).unwrap();

    // Claiming partition 1 before the old owner releases it is rejected
    let rejected = node
        .service
        .update(high_priority.clone(), &partitions(EVENT_TOPIC, &[1]), || {});
    assert!(matches!(rejected, Err(CoordinatorError::OverlappingOwnership { .. })));
    assert_eq!(node.service.partitions_for(&high_priority).unwrap(), PartitionSet::new());

    node.service.update(main.clone(), &partitions(EVENT_TOPIC, &[0]), || {}).unwrap();
    node.service.update(high_priority.clone(), &partitions(EVENT_TOPIC, &[1]), || {}).unwrap();

    assert_eq!(node.service.partitions_for(&main).unwrap(), partitions(EVENT_TOPIC, &[0]));
    assert_eq!(
        node.service.partitions_for(&high_priority).unwrap(),
        partitions(EVENT_TOPIC, &[1])
    );
    assert_eq!(node.events.subscribed(), partitions(EVENT_TOPIC, &[0, 1]));
}

#[test]
fn test_isolated_tenant_queue_keeps_tenant_scope() {
    let tenant = TenantId::new("tenant-a");
    let key = QueueKey::new(ServiceType::TbRuleEngine).with_tenant_id(tenant.clone());
    let node = node();
    let owned: PartitionSet = [TopicPartitionInfo::with_tenant("isolated.input", tenant.clone(), 4)].into();

    node.service.update(key.clone(), &owned, || {}).unwrap();

    let expected: PartitionSet = [TopicPartitionInfo::with_tenant(EVENT_TOPIC, tenant, 4)].into();
    assert_eq!(node.service.partitions_for(&key).unwrap(), expected);
    assert_eq!(node.events.subscribed(), expected);
}

#[test]
fn test_every_successful_update_completes_once() {
    let key = QueueKey::new(ServiceType::TbCore);
    let node = node();
    let completions = Arc::new(AtomicUsize::new(0));

    let notifications: Vec<&[u32]> = vec![&[0, 1], &[0, 1], &[1], &[]];
    for owned in notifications {
        let completions = Arc::clone(&completions);
        node.service
            .update(key.clone(), &partitions(EVENT_TOPIC, owned), move || {
                completions.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    assert_eq!(completions.load(Ordering::SeqCst), 4);
    assert!(node.events.subscribed().is_empty());
    assert!(node.service.partitions_for(&key).unwrap().is_empty());
}
