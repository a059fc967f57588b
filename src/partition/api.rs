//! Public API for partition identity types
//!
//! External modules should import from here rather than directly from internal modules.

pub use crate::partition::queue_key::{QueueKey, ServiceType, TenantId, MAIN_QUEUE_NAME};
pub use crate::partition::topic_partition::{with_topic, PartitionSet, TopicPartitionInfo};
