//! Partition and queue identity value types
//!
//! Immutable identifiers shared by the consumer managers and the queue state
//! coordinator:
//!
//! - [`QueueKey`] names a logical queue (service type, queue name, tenant)
//! - [`TopicPartitionInfo`] names one partition of one broker topic, optionally
//!   scoped to a tenant
//!
//! A queue owns the same partition numbers on several physical topics (event
//! topic, state topic, mirrored topics). [`TopicPartitionInfo::with_topic`]
//! and [`with_topic`] project a partition set from one topic onto another.

pub mod api;
mod queue_key;
mod topic_partition;

pub use queue_key::{QueueKey, ServiceType, TenantId, MAIN_QUEUE_NAME};
pub use topic_partition::{with_topic, PartitionSet, TopicPartitionInfo};
