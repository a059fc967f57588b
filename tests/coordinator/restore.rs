//! Two-phase restore with state completions on background workers

use crate::common::{partitions, wait_until, EVENT_TOPIC, STATE_TOPIC};
use queuestate::consumer::api::{
    ConsumerCall, InMemoryConsumerManager, RestoreMode, StartOffsetsProvider,
};
use queuestate::coordinator::api::{QueueConsumers, QueueStateService, RestoreCallback};
use queuestate::partition::api::{QueueKey, ServiceType, TopicPartitionInfo};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Progress {
    restored: Mutex<Vec<TopicPartitionInfo>>,
    drained: AtomicUsize,
}

impl RestoreCallback for Progress {
    fn on_partition_restored(&self, partition: &TopicPartitionInfo) {
        self.restored.lock().unwrap().push(partition.clone());
    }

    fn on_all_partitions_restored(&self) {
        self.drained.fetch_add(1, Ordering::SeqCst);
    }
}

struct Fixture {
    events: Arc<InMemoryConsumerManager>,
    state: Arc<InMemoryConsumerManager>,
    progress: Arc<Progress>,
    service: QueueStateService,
}

fn fixture(delay: Duration) -> Fixture {
    let events = Arc::new(InMemoryConsumerManager::manual(EVENT_TOPIC));
    let state = Arc::new(InMemoryConsumerManager::new(
        STATE_TOPIC,
        RestoreMode::Background { delay, workers: 3 },
    ));
    let progress = Arc::new(Progress::default());
    let committed = events.clone();
    let provider: StartOffsetsProvider = Arc::new(move || committed.committed_offsets());
    let service = QueueStateService::new_kafka(
        QueueConsumers::new(events.clone()).with_restore_callback(progress.clone()),
        state.clone(),
        Some(provider),
    );
    Fixture {
        events,
        state,
        progress,
        service,
    }
}

#[test]
fn test_background_restore_converges() {
    let f = fixture(Duration::from_millis(2));
    let key = QueueKey::new(ServiceType::TbRuleEngine);
    let done = Arc::new(AtomicUsize::new(0));
    let signal = Arc::clone(&done);

    f.service
        .update(key, &partitions(EVENT_TOPIC, &[0, 1, 2, 3, 4, 5]), move || {
            signal.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || done.load(Ordering::SeqCst) == 1));
    assert_eq!(f.events.subscribed(), partitions(EVENT_TOPIC, &[0, 1, 2, 3, 4, 5]));
    assert_eq!(f.state.subscribed(), partitions(STATE_TOPIC, &[0, 1, 2, 3, 4, 5]));
    assert!(f.service.partitions_in_progress().is_empty());
    assert_eq!(f.progress.restored.lock().unwrap().len(), 6);
    assert_eq!(f.progress.drained.load(Ordering::SeqCst), 1);

    f.service.stop();
    assert!(f.events.is_stopped());
    assert!(f.state.is_stopped());
}

#[test]
fn test_committed_offsets_become_start_offsets() {
    let f = fixture(Duration::ZERO);
    let key = QueueKey::new(ServiceType::TbRuleEngine);
    let p1 = TopicPartitionInfo::new(EVENT_TOPIC, 1);
    f.events.commit(&p1, 42);

    let done = Arc::new(AtomicUsize::new(0));
    let signal = Arc::clone(&done);
    f.service
        .update(key, &partitions(EVENT_TOPIC, &[1]), move || {
            signal.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || done.load(Ordering::SeqCst) == 1));
    let start_offsets = f.events.calls().into_iter().find_map(|call| match call {
        ConsumerCall::Add { start_offsets, .. } => start_offsets,
        _ => None,
    });
    assert_eq!(
        start_offsets.and_then(|offsets| offsets.get("tb_rule_engine.main.1").copied()),
        Some(42)
    );
    assert_eq!(f.events.position(&p1), Some(42));
    f.service.stop();
}

#[test]
fn test_partition_released_during_restore_is_not_consumed() {
    let f = fixture(Duration::from_millis(100));
    let key = QueueKey::new(ServiceType::TbRuleEngine);
    let done = Arc::new(AtomicUsize::new(0));
    let signal = Arc::clone(&done);

    f.service
        .update(key.clone(), &partitions(EVENT_TOPIC, &[0, 1]), move || {
            signal.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    // Released while its state is still being read
    f.service.update(key, &partitions(EVENT_TOPIC, &[0]), || {}).unwrap();

    assert!(wait_until(Duration::from_secs(5), || done.load(Ordering::SeqCst) == 1));
    assert_eq!(f.events.subscribed(), partitions(EVENT_TOPIC, &[0]));
    assert_eq!(f.state.subscribed(), partitions(STATE_TOPIC, &[0]));
    assert!(f.service.partitions_in_progress().is_empty());
    f.service.stop();
}
