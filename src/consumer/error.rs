//! Consumer Manager Error Types

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("Consumer for topic {topic} is stopped")]
    Stopped { topic: String },

    #[error("Subscription failed on topic {topic}: {message}")]
    SubscriptionFailed { topic: String, message: String },
}

/// Result type for consumer manager operations
pub type ConsumerResult<T> = Result<T, ConsumerError>;
