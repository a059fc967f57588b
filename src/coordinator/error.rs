//! Coordinator Error Types

use crate::consumer::api::ConsumerError;
use crate::core::error_handling::ContextualError;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Consumer manager call failed: {0}")]
    Consumer(#[from] ConsumerError),

    #[error("Partition {partition} requested for {queue_key} is already owned by {owner}")]
    OverlappingOwnership {
        queue_key: String,
        partition: String,
        owner: String,
    },

    #[error("Partitions map unavailable: {message}")]
    LockPoisoned { message: String },
}

impl CoordinatorError {
    pub(crate) fn lock_poisoned(message: String) -> Self {
        CoordinatorError::LockPoisoned { message }
    }
}

impl ContextualError for CoordinatorError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, CoordinatorError::OverlappingOwnership { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            CoordinatorError::OverlappingOwnership { .. } => {
                Some("Ownership notification assigns a partition to two queues")
            }
            _ => None,
        }
    }
}

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
