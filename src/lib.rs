pub mod app;
pub mod consumer;
pub mod coordinator;
pub mod core;
pub mod partition;
