//! In-process consumer manager
//!
//! Records every call it receives and tracks subscriptions and committed
//! positions without a broker. Restore completions are delivered either on
//! demand ([`RestoreMode::Manual`]) or by a small pool of worker threads
//! owned by the manager ([`RestoreMode::Background`]), which is how a real
//! state consumer reports catch-up.

use crate::consumer::error::{ConsumerError, ConsumerResult};
use crate::consumer::traits::{
    MirroredConsumer, OnPartitionRestored, PartitionedQueueConsumerManager, StartOffsets,
};
use crate::partition::api::{PartitionSet, TopicPartitionInfo};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// How restore completions are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// Completions are held until [`InMemoryConsumerManager::complete_restore`]
    /// or [`InMemoryConsumerManager::complete_all_restores`] is called
    Manual,
    /// Worker threads complete each restore after `delay`
    Background { delay: Duration, workers: usize },
}

/// One call received by an [`InMemoryConsumerManager`]
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerCall {
    Add {
        partitions: PartitionSet,
        restoring: bool,
        start_offsets: Option<StartOffsets>,
    },
    Remove {
        partitions: PartitionSet,
    },
    Delete {
        partitions: PartitionSet,
    },
    Stop,
}

struct RestoreTask {
    partition: TopicPartitionInfo,
    on_restored: OnPartitionRestored,
}

#[derive(Default)]
struct ConsumerState {
    subscribed: PartitionSet,
    positions: HashMap<TopicPartitionInfo, i64>,
    pending_restores: Vec<RestoreTask>,
    calls: Vec<ConsumerCall>,
    fail_next: Option<String>,
}

/// Consumer manager for one topic, backed by in-memory bookkeeping
///
/// # Example
///
/// ```rust
/// use queuestate::consumer::api::{
///     InMemoryConsumerManager, MirroredConsumer, PartitionedQueueConsumerManager,
/// };
/// use queuestate::partition::api::{PartitionSet, TopicPartitionInfo};
/// use std::sync::{Arc, Mutex};
///
/// let state = InMemoryConsumerManager::manual("events.state");
/// let partitions: PartitionSet = [TopicPartitionInfo::new("events.state", 0)].into();
///
/// let restored = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&restored);
/// state
///     .add_partitions_with(
///         &partitions,
///         Some(Arc::new(move |p| sink.lock().unwrap().push(p))),
///         None,
///     )
///     .unwrap();
///
/// assert_eq!(state.complete_all_restores(), 1);
/// assert_eq!(restored.lock().unwrap().len(), 1);
/// ```
pub struct InMemoryConsumerManager {
    topic: String,
    state: Mutex<ConsumerState>,
    stopped: Arc<AtomicBool>,
    restore_tx: Mutex<Option<mpsc::Sender<RestoreTask>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl InMemoryConsumerManager {
    pub fn new(topic: impl Into<String>, mode: RestoreMode) -> Self {
        let topic = topic.into();
        let stopped = Arc::new(AtomicBool::new(false));
        let mut restore_tx = None;
        let mut workers = Vec::new();

        if let RestoreMode::Background { delay, workers: count } = mode {
            let (tx, rx) = mpsc::channel::<RestoreTask>();
            let rx = Arc::new(Mutex::new(rx));
            for index in 0..count.max(1) {
                let rx = Arc::clone(&rx);
                let stopped = Arc::clone(&stopped);
                let name = format!("{}-restore-{}", topic, index);
                let spawned = std::thread::Builder::new()
                    .name(name)
                    .spawn(move || restore_worker(rx, stopped, delay));
                match spawned {
                    Ok(handle) => workers.push(handle),
                    Err(e) => log::error!("Failed to start restore worker for {}: {}", topic, e),
                }
            }
            restore_tx = Some(tx);
        }

        Self {
            topic,
            state: Mutex::new(ConsumerState::default()),
            stopped,
            restore_tx: Mutex::new(restore_tx),
            workers: Mutex::new(workers),
        }
    }

    /// Manager whose restores complete only when asked to
    pub fn manual(topic: impl Into<String>) -> Self {
        Self::new(topic, RestoreMode::Manual)
    }

    fn state(&self) -> MutexGuard<'_, ConsumerState> {
        // Bookkeeping stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next add/remove/delete call fail with `message`
    pub fn fail_next_call(&self, message: impl Into<String>) {
        self.state().fail_next = Some(message.into());
    }

    /// Record a committed position for `partition`
    pub fn commit(&self, partition: &TopicPartitionInfo, offset: i64) {
        self.state().positions.insert(partition.clone(), offset);
    }

    /// Committed or start position of `partition`, if any
    pub fn position(&self, partition: &TopicPartitionInfo) -> Option<i64> {
        self.state().positions.get(partition).copied()
    }

    /// Committed positions keyed by full topic name, the shape start offsets use
    pub fn committed_offsets(&self) -> StartOffsets {
        self.state()
            .positions
            .iter()
            .map(|(partition, offset)| (partition.full_topic_name(), *offset))
            .collect()
    }

    /// Partitions currently subscribed
    pub fn subscribed(&self) -> PartitionSet {
        self.state().subscribed.clone()
    }

    /// Every call received so far, oldest first
    pub fn calls(&self) -> Vec<ConsumerCall> {
        self.state().calls.clone()
    }

    /// Partitions passed to `add_partitions`/`add_partitions_with`, in order
    pub fn added_partitions(&self) -> Vec<TopicPartitionInfo> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                ConsumerCall::Add { partitions, .. } => Some(partitions.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Partitions awaiting a manual restore completion
    pub fn pending_restores(&self) -> Vec<TopicPartitionInfo> {
        self.state()
            .pending_restores
            .iter()
            .map(|task| task.partition.clone())
            .collect()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Deliver the restore completion for `partition`
    ///
    /// Returns `false` if no restore is pending for it. The callback runs on
    /// the calling thread, outside the manager's internal lock.
    pub fn complete_restore(&self, partition: &TopicPartitionInfo) -> bool {
        let task = {
            let mut state = self.state();
            let index = state
                .pending_restores
                .iter()
                .position(|task| &task.partition == partition);
            index.map(|index| state.pending_restores.remove(index))
        };
        match task {
            Some(task) => {
                (task.on_restored)(task.partition);
                true
            }
            None => false,
        }
    }

    /// Deliver every pending restore completion, oldest first
    pub fn complete_all_restores(&self) -> usize {
        let tasks = std::mem::take(&mut self.state().pending_restores);
        let count = tasks.len();
        for task in tasks {
            (task.on_restored)(task.partition);
        }
        count
    }

    fn take_failure(&self, state: &mut ConsumerState) -> ConsumerResult<()> {
        if self.is_stopped() {
            return Err(ConsumerError::Stopped {
                topic: self.topic.clone(),
            });
        }
        match state.fail_next.take() {
            Some(message) => Err(ConsumerError::SubscriptionFailed {
                topic: self.topic.clone(),
                message,
            }),
            None => Ok(()),
        }
    }

    fn schedule_restores(&self, partitions: &PartitionSet, on_restored: OnPartitionRestored) {
        let sender = self
            .restore_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut tasks: Vec<RestoreTask> = partitions
            .iter()
            .map(|partition| RestoreTask {
                partition: partition.clone(),
                on_restored: Arc::clone(&on_restored),
            })
            .collect();
        tasks.sort_by(|a, b| a.partition.cmp(&b.partition));

        match sender {
            Some(sender) => {
                for task in tasks {
                    if let Err(mpsc::SendError(task)) = sender.send(task) {
                        // Workers are gone; complete inline to honour the restore contract
                        (task.on_restored)(task.partition);
                    }
                }
            }
            None => self.state().pending_restores.extend(tasks),
        }
    }
}

fn restore_worker(
    rx: Arc<Mutex<mpsc::Receiver<RestoreTask>>>,
    stopped: Arc<AtomicBool>,
    delay: Duration,
) {
    loop {
        let task = {
            let rx = rx.lock().unwrap_or_else(PoisonError::into_inner);
            rx.recv()
        };
        let Ok(task) = task else {
            break;
        };
        if !stopped.load(Ordering::Acquire) && !delay.is_zero() {
            std::thread::sleep(delay);
        }
        log::trace!("State caught up for {}", task.partition);
        (task.on_restored)(task.partition);
    }
}

impl MirroredConsumer for InMemoryConsumerManager {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn add_partitions(&self, partitions: &PartitionSet) -> ConsumerResult<()> {
        self.add_partitions_with(partitions, None, None)
    }

    fn remove_partitions(&self, partitions: &PartitionSet) -> ConsumerResult<()> {
        let mut state = self.state();
        self.take_failure(&mut state)?;
        for partition in partitions {
            state.subscribed.remove(partition);
        }
        state.calls.push(ConsumerCall::Remove {
            partitions: partitions.clone(),
        });
        Ok(())
    }

    fn delete(&self, partitions: &PartitionSet) -> ConsumerResult<()> {
        let mut state = self.state();
        self.take_failure(&mut state)?;
        for partition in partitions {
            state.subscribed.remove(partition);
            state.positions.remove(partition);
        }
        state.calls.push(ConsumerCall::Delete {
            partitions: partitions.clone(),
        });
        Ok(())
    }
}

impl PartitionedQueueConsumerManager for InMemoryConsumerManager {
    fn add_partitions_with(
        &self,
        partitions: &PartitionSet,
        on_restored: Option<OnPartitionRestored>,
        start_offsets: Option<Arc<StartOffsets>>,
    ) -> ConsumerResult<()> {
        {
            let mut state = self.state();
            self.take_failure(&mut state)?;
            for partition in partitions {
                state.subscribed.insert(partition.clone());
                let start = start_offsets
                    .as_ref()
                    .and_then(|offsets| offsets.get(&partition.full_topic_name()).copied());
                if let Some(offset) = start {
                    state.positions.insert(partition.clone(), offset);
                }
            }
            state.calls.push(ConsumerCall::Add {
                partitions: partitions.clone(),
                restoring: on_restored.is_some(),
                start_offsets: start_offsets.as_deref().cloned(),
            });
        }

        if let Some(on_restored) = on_restored {
            self.schedule_restores(partitions, on_restored);
        }
        Ok(())
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        log::debug!("Stopping consumer for {}", self.topic);
        self.state().calls.push(ConsumerCall::Stop);
        // Closing the channel lets the workers drain and exit
        self.restore_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn await_stop(&self) {
        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for worker in workers {
            if worker.join().is_err() {
                log::warn!("Restore worker for {} panicked", self.topic);
            }
        }
        log::debug!("Consumer for {} stopped", self.topic);
    }
}
