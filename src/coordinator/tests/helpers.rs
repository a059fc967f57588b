//! Shared fixtures for coordinator tests

use crate::consumer::api::{InMemoryConsumerManager, StartOffsets, StartOffsetsProvider};
use crate::coordinator::api::{QueueConsumers, QueueStateService, RestoreCallback};
use crate::partition::api::{PartitionSet, QueueKey, ServiceType, TenantId, TopicPartitionInfo};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const EVENT_TOPIC: &str = "tb_rule_engine.main";
pub const STATE_TOPIC: &str = "tb_rule_engine.main.state";
pub const MIRROR_TOPIC: &str = "tb_edqs.events";

#[derive(Debug, Clone, PartialEq)]
pub enum RestoreEvent {
    Partition(TopicPartitionInfo),
    All,
}

/// Records restore notifications in arrival order
#[derive(Default)]
pub struct RecordingCallback {
    events: Mutex<Vec<RestoreEvent>>,
}

impl RecordingCallback {
    pub fn events(&self) -> Vec<RestoreEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn all_restored_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| **event == RestoreEvent::All)
            .count()
    }
}

impl RestoreCallback for RecordingCallback {
    fn on_partition_restored(&self, partition: &TopicPartitionInfo) {
        self.events
            .lock()
            .unwrap()
            .push(RestoreEvent::Partition(partition.clone()));
    }

    fn on_all_partitions_restored(&self) {
        self.events.lock().unwrap().push(RestoreEvent::All);
    }
}

/// Counts how many times a continuation ran
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn callback(&self) -> impl FnOnce() + Send + 'static {
        let count = Arc::clone(&self.0);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn queue_key() -> QueueKey {
    QueueKey::new(ServiceType::TbRuleEngine)
}

pub fn tenant_queue_key(tenant: &str) -> QueueKey {
    QueueKey::new(ServiceType::TbRuleEngine)
        .with_queue_name("Isolated")
        .with_tenant_id(TenantId::new(tenant))
}

pub fn tp(topic: &str, partition: u32) -> TopicPartitionInfo {
    TopicPartitionInfo::new(topic, partition)
}

pub fn partitions(topic: &str, numbers: &[u32]) -> PartitionSet {
    numbers.iter().map(|p| tp(topic, *p)).collect()
}

/// Two-phase service wired to manual in-memory consumers
pub struct KafkaFixture {
    pub events: Arc<InMemoryConsumerManager>,
    pub state: Arc<InMemoryConsumerManager>,
    pub mirror: Arc<InMemoryConsumerManager>,
    pub callback: Arc<RecordingCallback>,
    pub snapshots: Counter,
    pub service: QueueStateService,
}

impl KafkaFixture {
    pub fn new() -> Self {
        Self::with_consumers(
            Arc::new(InMemoryConsumerManager::manual(EVENT_TOPIC)),
            Arc::new(InMemoryConsumerManager::manual(STATE_TOPIC)),
        )
    }

    pub fn with_consumers(
        events: Arc<InMemoryConsumerManager>,
        state: Arc<InMemoryConsumerManager>,
    ) -> Self {
        let mirror = Arc::new(InMemoryConsumerManager::manual(MIRROR_TOPIC));
        let callback = Arc::new(RecordingCallback::default());
        let snapshots = Counter::default();

        let provider: StartOffsetsProvider = {
            let snapshots = snapshots.clone();
            Arc::new(move || {
                let taken = snapshots.0.fetch_add(1, Ordering::SeqCst) as i64;
                (0..8)
                    .map(|p| (format!("{}.{}", EVENT_TOPIC, p), 100 * (taken + 1) + p))
                    .collect::<StartOffsets>()
            })
        };

        let consumers = QueueConsumers::new(events.clone())
            .with_other_consumer(mirror.clone())
            .with_restore_callback(callback.clone());
        let service = QueueStateService::new_kafka(consumers, state.clone(), Some(provider));

        Self {
            events,
            state,
            mirror,
            callback,
            snapshots,
            service,
        }
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
