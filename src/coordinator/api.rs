//! Public API for the queue state coordinator
//!
//! External modules should import from here rather than directly from internal modules.

pub use crate::coordinator::callback::{RestoreCallback, WhenAllProcessed};
pub use crate::coordinator::in_progress::{Completion, PartitionsInProgress};
pub use crate::coordinator::service::QueueStateService;
pub use crate::coordinator::strategy::QueueConsumers;

// Error handling
pub use crate::coordinator::error::{CoordinatorError, CoordinatorResult};
