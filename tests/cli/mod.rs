//! CLI integration test modules

pub mod simulate;
pub mod version;
