//! Set of state-topic partitions currently being restored

use crate::partition::api::{PartitionSet, TopicPartitionInfo};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Partitions whose state restore has been requested but not yet completed
///
/// Counts each request separately, so a partition that is removed and
/// re-added before its first restore completes stays tracked until both
/// completions arrive.
#[derive(Debug, Default)]
pub struct PartitionsInProgress {
    requests: Mutex<HashMap<TopicPartitionInfo, usize>>,
}

/// Outcome of completing one restore request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Distinct partitions still in progress
    pub remaining: usize,
    /// The completed partition has a later request still outstanding
    pub partition_pending: bool,
}

impl PartitionsInProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn requests(&self) -> MutexGuard<'_, HashMap<TopicPartitionInfo, usize>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a restore request for every partition in `partitions`
    pub fn add_all(&self, partitions: &PartitionSet) {
        let mut requests = self.requests();
        for partition in partitions {
            *requests.entry(partition.clone()).or_insert(0) += 1;
        }
    }

    /// Complete one restore request for `partition`
    ///
    /// Returns `None` if no request was outstanding for `partition`.
    pub fn complete(&self, partition: &TopicPartitionInfo) -> Option<Completion> {
        let mut requests = self.requests();
        let count = requests.get_mut(partition)?;
        *count -= 1;
        let partition_pending = *count > 0;
        if !partition_pending {
            requests.remove(partition);
        }
        Some(Completion {
            remaining: requests.len(),
            partition_pending,
        })
    }

    /// Withdraw requests that were never handed to the consumer manager
    pub fn withdraw_all(&self, partitions: &PartitionSet) {
        for partition in partitions {
            self.complete(partition);
        }
    }

    pub fn contains(&self, partition: &TopicPartitionInfo) -> bool {
        self.requests().contains_key(partition)
    }

    pub fn is_empty(&self) -> bool {
        self.requests().is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests().len()
    }

    pub fn snapshot(&self) -> PartitionSet {
        self.requests().keys().cloned().collect()
    }
}
