//! Coordinator integration test modules

pub mod handover;
pub mod restore;
