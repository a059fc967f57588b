//! TOML configuration file loading
//!
//! The file is optional. An explicitly named file must exist; otherwise
//! `<config dir>/Queuestate/queuestate.toml` is used when present. Command
//! line options are applied on top of the loaded values.

use crate::app::cli::args::{Args, SimulateArgs};
use crate::consumer::api::RestoreMode;
use crate::core::error_handling::ContextualError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_EVENT_TOPIC: &str = "tb_rule_engine.main";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The specified configuration file does not exist: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Error reading configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing configuration file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ConfigError::Invalid { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid { message } => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub coordinator: CoordinatorSettings,
    pub simulation: SimulationSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<PathBuf>,
}

/// Topics the coordinator drives
///
/// Without a `state_topic` the coordinator subscribes owned partitions
/// immediately; with one it restores state before consuming events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorSettings {
    pub event_topic: String,
    pub state_topic: Option<String>,
    pub mirrored_topics: Vec<String>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            event_topic: DEFAULT_EVENT_TOPIC.to_string(),
            state_topic: None,
            mirrored_topics: Vec::new(),
        }
    }
}

impl CoordinatorSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_topic.trim().is_empty() {
            return Err(ConfigError::invalid("event_topic must not be empty"));
        }
        if let Some(state_topic) = &self.state_topic {
            if state_topic.trim().is_empty() {
                return Err(ConfigError::invalid("state_topic must not be empty"));
            }
            if state_topic == &self.event_topic {
                return Err(ConfigError::invalid(format!(
                    "state_topic must differ from event_topic '{}'",
                    self.event_topic
                )));
            }
        }
        for (index, topic) in self.mirrored_topics.iter().enumerate() {
            if topic.trim().is_empty() {
                return Err(ConfigError::invalid("mirrored_topics must not contain empty names"));
            }
            if topic == &self.event_topic || Some(topic) == self.state_topic.as_ref() {
                return Err(ConfigError::invalid(format!(
                    "mirrored topic '{}' duplicates the event or state topic",
                    topic
                )));
            }
            if self.mirrored_topics[..index].contains(topic) {
                return Err(ConfigError::invalid(format!(
                    "mirrored topic '{}' is listed twice",
                    topic
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSettings {
    pub restore_delay_ms: u64,
    pub restore_workers: usize,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            restore_delay_ms: 50,
            restore_workers: 2,
        }
    }
}

impl SimulationSettings {
    pub fn restore_mode(&self) -> RestoreMode {
        RestoreMode::Background {
            delay: Duration::from_millis(self.restore_delay_ms),
            workers: self.restore_workers,
        }
    }
}

impl Settings {
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default configuration file location, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("Queuestate").join("queuestate.toml"))
    }

    /// Load settings from `config_file`, the default location, or defaults
    pub async fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_file {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    log::debug!("No configuration file found; using defaults");
                    return Ok(Self::default());
                }
            },
        };

        log::debug!("Loading configuration from {}", path.display());
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
        Self::from_toml_str(&contents, &path)
    }

    /// Apply global logging options from the command line
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(level) = &args.log_level {
            self.logging.level = Some(level.clone());
        }
        if let Some(format) = &args.log_format {
            self.logging.format = Some(format.clone());
        }
        if let Some(file) = args.log_file_override() {
            self.logging.file = file;
        }
    }

    /// Apply `simulate` options from the command line and validate the result
    pub fn apply_simulate_args(&mut self, args: &SimulateArgs) -> Result<(), ConfigError> {
        if let Some(event_topic) = &args.event_topic {
            self.coordinator.event_topic = event_topic.clone();
        }
        if args.no_state {
            self.coordinator.state_topic = None;
        } else if let Some(state_topic) = &args.state_topic {
            self.coordinator.state_topic = Some(state_topic.clone());
        }
        if !args.mirrored_topics.is_empty() {
            self.coordinator.mirrored_topics = args.mirrored_topics.clone();
        }
        if let Some(delay) = args.restore_delay_ms {
            self.simulation.restore_delay_ms = delay;
        }
        if let Some(workers) = args.restore_workers {
            self.simulation.restore_workers = workers;
        }
        if self.simulation.restore_workers == 0 {
            return Err(ConfigError::invalid("restore_workers must be at least 1"));
        }
        self.coordinator.validate()
    }
}
