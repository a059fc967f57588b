//! Test modules for the queue state coordinator
//!
//! Organised by functional area: ownership bookkeeping shared by both
//! strategies, the immediate strategy, the two-phase restore protocol,
//! failure handling, and concurrent restore delivery.

mod helpers;
