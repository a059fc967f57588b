//! Command line application

pub mod cli;
pub mod simulate;
pub mod startup;
