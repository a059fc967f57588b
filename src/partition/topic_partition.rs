//! Topic-partition identity and topic projection

use crate::partition::queue_key::TenantId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Set of partitions owned, added, or removed in one operation
pub type PartitionSet = HashSet<TopicPartitionInfo>;

/// One partition of one broker topic, optionally tenant-scoped
///
/// Immutable; equality and hashing cover topic, tenant scope and partition
/// number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartitionInfo {
    topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tenant_id: Option<TenantId>,
    partition: u32,
}

impl TopicPartitionInfo {
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            tenant_id: None,
            partition,
        }
    }

    pub fn with_tenant(topic: impl Into<String>, tenant_id: TenantId, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            tenant_id: Some(tenant_id),
            partition,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Broker-level name of this partition, e.g. `tb_rule_engine.main.3`
    ///
    /// Start-offset maps are keyed by this name.
    pub fn full_topic_name(&self) -> String {
        format!("{}.{}", self.topic, self.partition)
    }

    /// Copy of this partition on another topic
    ///
    /// Partition number and tenant scope are preserved; this is how a queue's
    /// owned partitions are mirrored onto its state and mirrored topics.
    pub fn with_topic(&self, topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            tenant_id: self.tenant_id.clone(),
            partition: self.partition,
        }
    }
}

impl fmt::Display for TopicPartitionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tenant_id {
            Some(tenant_id) => write!(f, "{}[{}]", self.full_topic_name(), tenant_id),
            None => f.write_str(&self.full_topic_name()),
        }
    }
}

/// Project every partition of `partitions` onto `topic`
pub fn with_topic<'a, I>(partitions: I, topic: &str) -> PartitionSet
where
    I: IntoIterator<Item = &'a TopicPartitionInfo>,
{
    partitions
        .into_iter()
        .map(|partition| partition.with_topic(topic))
        .collect()
}
