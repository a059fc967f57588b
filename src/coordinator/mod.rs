//! Partition-aware queue state coordination
//!
//! Decides, for every logical queue this node serves, which topic-partitions
//! the node currently owns, and hands partitions over between nodes without
//! losing per-partition processing state.
//!
//! # Overview
//!
//! An external discovery service delivers ownership-change notifications,
//! `(QueueKey, partitions)`, on one dispatch thread. [`QueueStateService`]
//! diffs each notification against the partitions it already owns:
//!
//! - removed partitions are unsubscribed from every consumer manager at once
//! - added partitions are brought into service by the restore strategy
//!
//! ```text
//!   discovery ──update(key, partitions)──▶ QueueStateService
//!                                            │ diff under writer lock
//!                        ┌───────────────────┴───────────────────┐
//!                        ▼ removed                               ▼ added
//!           event + state + mirrored                  ┌──────────┴──────────┐
//!           consumers unsubscribe                     ▼ default             ▼ kafka
//!                                               subscribe now        restore state topic,
//!                                                                    then subscribe events
//!                                                                    per restored partition
//! ```
//!
//! With the two-phase strategy, event consumption for a partition starts only
//! after its checkpoint has been replayed from the state topic, and only if the
//! partition is still owned once the replay finishes.

pub mod api;
mod callback;
mod default_strategy;
mod error;
mod in_progress;
mod kafka_strategy;
mod service;
mod strategy;

pub use callback::{RestoreCallback, WhenAllProcessed};
pub use error::{CoordinatorError, CoordinatorResult};
pub use in_progress::{Completion, PartitionsInProgress};
pub use service::QueueStateService;
pub use strategy::QueueConsumers;

use crate::partition::api::PartitionSet;

/// Sorted, comma-separated rendering of a partition set for log lines
pub(crate) fn describe_partitions(partitions: &PartitionSet) -> String {
    let mut names: Vec<String> = partitions.iter().map(ToString::to_string).collect();
    names.sort();
    names.join(", ")
}

#[cfg(test)]
mod tests;
