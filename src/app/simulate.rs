//! Scenario replay through in-memory consumer managers
//!
//! A scenario is a TOML list of `[[step]]` tables applied in order:
//!
//! ```toml
//! [[step]]
//! action = "update"
//! queue = { service_type = "tb_rule_engine", queue_name = "Main" }
//! partitions = [0, 1, 2]
//!
//! [[step]]
//! action = "commit"
//! partition = 1
//! offset = 42
//!
//! [[step]]
//! action = "wait"
//!
//! [[step]]
//! action = "delete"
//! partitions = [2]
//! ```
//!
//! `update` does not wait for its partitions to come into service; `wait`
//! blocks until every earlier update has finished. The replay always waits
//! for outstanding updates at the end unless a shutdown signal arrives.

use crate::app::cli::config::Settings;
use crate::consumer::api::{
    InMemoryConsumerManager, MirroredConsumer, RestoreMode, StartOffsetsProvider,
};
use crate::coordinator::api::{
    CoordinatorError, QueueConsumers, QueueStateService, RestoreCallback,
};
use crate::partition::api::{PartitionSet, QueueKey, TenantId, TopicPartitionInfo};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, oneshot};

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Error reading scenario file {}: {source}", path.display())]
    ReadScenario {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing scenario file {}: {source}", path.display())]
    ParseScenario {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Step {step} failed: {source}")]
    Step {
        step: usize,
        #[source]
        source: CoordinatorError,
    },
}

impl crate::core::error_handling::ContextualError for SimulationError {
    fn is_user_actionable(&self) -> bool {
        match self {
            SimulationError::ParseScenario { .. } => true,
            SimulationError::Step { source, .. } => source.is_user_actionable(),
            SimulationError::ReadScenario { .. } => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            SimulationError::ParseScenario { .. } => Some("Scenario file is not valid TOML"),
            SimulationError::Step { source, .. } => source.user_message(),
            SimulationError::ReadScenario { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Scenario {
    #[serde(rename = "step", default)]
    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Complete set of partitions now owned for `queue`
    Update { queue: QueueKey, partitions: Vec<u32> },
    /// Partitions deleted from every consumer
    Delete {
        partitions: Vec<u32>,
        #[serde(default)]
        tenant_id: Option<TenantId>,
    },
    /// Committed event offset, used as the start offset on the next restore
    Commit {
        partition: u32,
        offset: i64,
        #[serde(default)]
        tenant_id: Option<TenantId>,
    },
    /// Wait for every earlier update to finish
    Wait,
}

impl Scenario {
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, SimulationError> {
        toml::from_str(contents).map_err(|source| SimulationError::ParseScenario {
            path: path.to_path_buf(),
            source,
        })
    }

    pub async fn load(path: &Path) -> Result<Self, SimulationError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SimulationError::ReadScenario {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&contents, path)
    }
}

/// Outcome of a replay
#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    pub steps_applied: usize,
    pub interrupted: bool,
    /// Owned event partitions per queue, sorted
    pub partitions: Vec<(QueueKey, Vec<TopicPartitionInfo>)>,
    /// Subscriptions per consumer topic, sorted
    pub subscriptions: Vec<(String, Vec<TopicPartitionInfo>)>,
    /// State partitions in the order their restores completed
    pub restored: Vec<TopicPartitionInfo>,
    pub restore_rounds: usize,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Steps applied: {}", self.steps_applied)?;
        if self.interrupted {
            writeln!(f, "Interrupted before all updates finished")?;
        }
        writeln!(f, "Owned partitions:")?;
        if self.partitions.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for (queue_key, partitions) in &self.partitions {
            writeln!(f, "  {}: {}", queue_key, join(partitions))?;
        }
        writeln!(f, "Subscriptions:")?;
        for (topic, partitions) in &self.subscriptions {
            writeln!(f, "  {}: {}", topic, join(partitions))?;
        }
        if self.restore_rounds > 0 {
            writeln!(
                f,
                "State restored: {} partition(s) in {} round(s)",
                self.restored.len(),
                self.restore_rounds
            )?;
        }
        Ok(())
    }
}

fn join(partitions: &[TopicPartitionInfo]) -> String {
    if partitions.is_empty() {
        return "-".to_string();
    }
    partitions
        .iter()
        .map(|p| p.partition().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn sorted(partitions: PartitionSet) -> Vec<TopicPartitionInfo> {
    let mut partitions: Vec<TopicPartitionInfo> = partitions.into_iter().collect();
    partitions.sort();
    partitions
}

#[derive(Default)]
struct ReportingRestoreCallback {
    restored: Mutex<Vec<TopicPartitionInfo>>,
    rounds: AtomicUsize,
}

impl RestoreCallback for ReportingRestoreCallback {
    fn on_partition_restored(&self, partition: &TopicPartitionInfo) {
        log::info!("State restored for {}", partition);
        self.restored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(partition.clone());
    }

    fn on_all_partitions_restored(&self) {
        let round = self.rounds.fetch_add(1, Ordering::AcqRel) + 1;
        log::info!("All pending state partitions restored (round {})", round);
    }
}

fn partition_on(topic: &str, tenant_id: Option<&TenantId>, partition: u32) -> TopicPartitionInfo {
    match tenant_id {
        Some(tenant_id) if !tenant_id.is_system() => {
            TopicPartitionInfo::with_tenant(topic, tenant_id.clone(), partition)
        }
        _ => TopicPartitionInfo::new(topic, partition),
    }
}

fn partitions_on(topic: &str, tenant_id: Option<&TenantId>, numbers: &[u32]) -> PartitionSet {
    numbers
        .iter()
        .map(|p| partition_on(topic, tenant_id, *p))
        .collect()
}

/// Consumers and coordinator wired from settings
struct Harness {
    service: Arc<QueueStateService>,
    event: Arc<InMemoryConsumerManager>,
    state: Option<Arc<InMemoryConsumerManager>>,
    mirrored: Vec<Arc<InMemoryConsumerManager>>,
    callback: Arc<ReportingRestoreCallback>,
}

impl Harness {
    fn new(settings: &Settings) -> Self {
        let coordinator = &settings.coordinator;
        let event = Arc::new(InMemoryConsumerManager::new(
            coordinator.event_topic.clone(),
            RestoreMode::Manual,
        ));
        let mirrored: Vec<Arc<InMemoryConsumerManager>> = coordinator
            .mirrored_topics
            .iter()
            .map(|topic| Arc::new(InMemoryConsumerManager::manual(topic.clone())))
            .collect();
        let callback = Arc::new(ReportingRestoreCallback::default());

        let mut consumers = QueueConsumers::new(event.clone());
        for consumer in &mirrored {
            consumers = consumers.with_other_consumer(consumer.clone() as Arc<dyn MirroredConsumer>);
        }

        let (service, state) = match &coordinator.state_topic {
            Some(state_topic) => {
                let state = Arc::new(InMemoryConsumerManager::new(
                    state_topic.clone(),
                    settings.simulation.restore_mode(),
                ));
                let committed = event.clone();
                let provider: StartOffsetsProvider = Arc::new(move || committed.committed_offsets());
                consumers = consumers.with_restore_callback(callback.clone());
                let service = QueueStateService::new_kafka(consumers, state.clone(), Some(provider));
                (service, Some(state))
            }
            None => (QueueStateService::new_default(consumers), None),
        };

        Self {
            service: Arc::new(service),
            event,
            state,
            mirrored,
            callback,
        }
    }

    fn report(&self, steps_applied: usize, interrupted: bool) -> Result<SimulationReport, CoordinatorError> {
        let mut partitions: Vec<(QueueKey, Vec<TopicPartitionInfo>)> = self
            .service
            .partitions()?
            .into_iter()
            .map(|(queue_key, owned)| (queue_key, sorted(owned)))
            .collect();
        partitions.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));

        let mut subscriptions = vec![(self.event.topic().to_string(), sorted(self.event.subscribed()))];
        if let Some(state) = &self.state {
            subscriptions.push((state.topic().to_string(), sorted(state.subscribed())));
        }
        for consumer in &self.mirrored {
            subscriptions.push((consumer.topic().to_string(), sorted(consumer.subscribed())));
        }

        Ok(SimulationReport {
            steps_applied,
            interrupted,
            partitions,
            subscriptions,
            restored: self
                .callback
                .restored
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            restore_rounds: self.callback.rounds.load(Ordering::Acquire),
        })
    }

    async fn stop(&self) {
        let service = Arc::clone(&self.service);
        if tokio::task::spawn_blocking(move || service.stop()).await.is_err() {
            log::warn!("Coordinator stop panicked");
        }
    }
}

/// Wait for every pending update, returning `false` if shutdown was requested first
async fn drain_pending(
    pending: &mut Vec<(usize, oneshot::Receiver<()>)>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> bool {
    for (step, done) in pending.drain(..) {
        tokio::select! {
            result = done => {
                if result.is_err() {
                    log::warn!("Update from step {} was abandoned", step);
                }
            }
            _ = shutdown_rx.recv() => {
                log::warn!("Shutdown requested; abandoning outstanding updates");
                return false;
            }
        }
    }
    true
}

/// Replay `scenario` against a coordinator wired from `settings`
pub async fn run_simulation(
    settings: &Settings,
    scenario: &Scenario,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<SimulationReport, SimulationError> {
    let harness = Harness::new(settings);
    let event_topic = settings.coordinator.event_topic.as_str();
    log::info!(
        "Replaying {} step(s) on {} ({})",
        scenario.steps.len(),
        event_topic,
        match &settings.coordinator.state_topic {
            Some(state_topic) => format!("state restored from {}", state_topic),
            None => "no state topic".to_string(),
        }
    );

    let mut pending: Vec<(usize, oneshot::Receiver<()>)> = Vec::new();
    let mut steps_applied = 0;
    let mut interrupted = false;

    for (index, step) in scenario.steps.iter().enumerate() {
        let step_number = index + 1;
        let outcome = match step {
            ScenarioStep::Update { queue, partitions } => {
                let owned = partitions_on(event_topic, Some(queue.tenant_id()), partitions);
                let (done_tx, done_rx) = oneshot::channel();
                let result = harness.service.update(queue.clone(), &owned, move || {
                    let _ = done_tx.send(());
                });
                if result.is_ok() {
                    pending.push((step_number, done_rx));
                }
                result
            }
            ScenarioStep::Delete { partitions, tenant_id } => harness
                .service
                .delete(&partitions_on(event_topic, tenant_id.as_ref(), partitions)),
            ScenarioStep::Commit {
                partition,
                offset,
                tenant_id,
            } => {
                harness
                    .event
                    .commit(&partition_on(event_topic, tenant_id.as_ref(), *partition), *offset);
                Ok(())
            }
            ScenarioStep::Wait => {
                if !drain_pending(&mut pending, &mut shutdown_rx).await {
                    interrupted = true;
                    break;
                }
                Ok(())
            }
        };

        if let Err(source) = outcome {
            harness.stop().await;
            return Err(SimulationError::Step {
                step: step_number,
                source,
            });
        }
        steps_applied += 1;
    }

    if !interrupted && !drain_pending(&mut pending, &mut shutdown_rx).await {
        interrupted = true;
    }

    let report = harness.report(steps_applied, interrupted);
    harness.stop().await;
    report.map_err(|source| SimulationError::Step {
        step: steps_applied,
        source,
    })
}
