//! Test modules for the consumer managers
