//! Command line arguments
//!
//! Global options configure logging and locate the configuration file;
//! subcommand options override the matching configuration file values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "queuestate")]
#[command(about = "Partition-aware queue state coordinator")]
#[command(version)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Force colored log output
    #[arg(short = 'g', long = "color", conflicts_with = "no_color", global = true)]
    pub color: bool,

    /// Disable colored log output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", global = true,
          value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", global = true,
          value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Replay a scenario of ownership changes through in-memory consumers
    Simulate(SimulateArgs),
    /// Show build information
    Version,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct SimulateArgs {
    /// Scenario file (TOML list of [[step]] entries)
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,

    /// Event topic consumed by the coordinator
    #[arg(short = 'e', long = "event-topic", value_name = "TOPIC")]
    pub event_topic: Option<String>,

    /// State topic restored before events (enables two-phase restore)
    #[arg(short = 's', long = "state-topic", value_name = "TOPIC", conflicts_with = "no_state")]
    pub state_topic: Option<String>,

    /// Ignore any configured state topic and subscribe immediately
    #[arg(long = "no-state")]
    pub no_state: bool,

    /// Additional topics that mirror the event partitions
    #[arg(short = 'm', long = "mirrored-topic", value_name = "TOPIC")]
    pub mirrored_topics: Vec<String>,

    /// Delay before each simulated state restore completes
    #[arg(long = "restore-delay-ms", value_name = "MILLIS")]
    pub restore_delay_ms: Option<u64>,

    /// Worker threads completing simulated state restores
    #[arg(long = "restore-workers", value_name = "COUNT")]
    pub restore_workers: Option<usize>,
}

impl Args {
    /// Resolve color: explicit flags first, otherwise whether stdout is a terminal
    pub fn use_color(&self) -> bool {
        if self.no_color {
            false
        } else if self.color {
            true
        } else {
            std::io::IsTerminal::is_terminal(&std::io::stdout())
        }
    }

    /// Log file to write to, treating `none` as no file
    pub fn log_file_override(&self) -> Option<Option<PathBuf>> {
        self.log_file.as_ref().map(|path| {
            if path.as_os_str().eq_ignore_ascii_case("none") {
                None
            } else {
                Some(path.clone())
            }
        })
    }
}
