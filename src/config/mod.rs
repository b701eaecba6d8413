//! Configuration module
//!
//! Harness settings come from an optional TOML file, then CLI flags override
//! them. Validation runs before anything touches the filesystem.

pub mod cli;
pub mod toml;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// Complete harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Superdirectory holding every experiment directory, the log and the table
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    /// Allow reusing an existing experiment directory
    #[serde(default)]
    pub overwrite: bool,
    /// Shared log file name under `results_dir` (must end in .txt)
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,
    /// Results table file name under `results_dir` (must end in .csv)
    #[serde(default = "default_table_file_name")]
    pub table_file_name: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_log_file_name() -> String {
    "log.txt".to_string()
}

fn default_table_file_name() -> String {
    "table.csv".to_string()
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            overwrite: false,
            log_file_name: default_log_file_name(),
            table_file_name: default_table_file_name(),
            logging: LoggingConfig::default(),
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Shared log file path
    pub fn log_file_path(&self) -> PathBuf {
        self.results_dir.join(&self.log_file_name)
    }

    /// Results table path
    pub fn table_path(&self) -> PathBuf {
        self.results_dir.join(&self.table_file_name)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Install the global subscriber when a run starts
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Also log to stdout
    #[serde(default = "default_true")]
    pub console: bool,
    /// Shared log verbosity on rank 0
    #[serde(default = "default_debug")]
    pub leader_level: LogLevel,
    /// Shared log verbosity on every other rank
    #[serde(default = "default_error")]
    pub follower_level: LogLevel,
    /// Write a per-process log file into each experiment directory
    #[serde(default = "default_true")]
    pub experiment_log: bool,
    /// Experiment log verbosity on rank 0
    #[serde(default = "default_debug")]
    pub experiment_leader_level: LogLevel,
    /// Experiment log verbosity on every other rank
    #[serde(default = "default_info")]
    pub experiment_follower_level: LogLevel,
}

fn default_true() -> bool {
    true
}

fn default_debug() -> LogLevel {
    LogLevel::Debug
}

fn default_info() -> LogLevel {
    LogLevel::Info
}

fn default_error() -> LogLevel {
    LogLevel::Error
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            console: true,
            leader_level: LogLevel::Debug,
            follower_level: LogLevel::Error,
            experiment_log: true,
            experiment_leader_level: LogLevel::Debug,
            experiment_follower_level: LogLevel::Info,
        }
    }
}

impl LoggingConfig {
    /// Shared log level for `rank`
    pub fn level_for(&self, rank: usize) -> LogLevel {
        if rank == 0 {
            self.leader_level
        } else {
            self.follower_level
        }
    }

    /// Experiment log level for `rank`
    pub fn experiment_level_for(&self, rank: usize) -> LogLevel {
        if rank == 0 {
            self.experiment_leader_level
        } else {
            self.experiment_follower_level
        }
    }
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Off => "off",
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Process group configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Number of cooperating processes
    #[serde(default = "default_world_size")]
    pub world_size: usize,
    /// This process's rank (0 is the leader)
    #[serde(default)]
    pub rank: usize,
    /// Address the leader listens on and followers connect to
    #[serde(default = "default_leader_addr")]
    pub leader_addr: String,
    /// Follower connection attempts before giving up
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    /// Pause between connection attempts
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

fn default_world_size() -> usize {
    1
}

fn default_leader_addr() -> String {
    "127.0.0.1:29400".to_string()
}

fn default_connect_retries() -> u32 {
    50
}

fn default_retry_interval_ms() -> u64 {
    200
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            world_size: default_world_size(),
            rank: 0,
            leader_addr: default_leader_addr(),
            connect_retries: default_connect_retries(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.results_dir, PathBuf::from("results"));
        assert!(!config.overwrite);
        assert_eq!(config.log_file_path(), PathBuf::from("results/log.txt"));
        assert_eq!(config.table_path(), PathBuf::from("results/table.csv"));
        assert_eq!(config.coordinator.world_size, 1);
    }

    #[test]
    fn test_levels_by_rank() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.level_for(0), LogLevel::Debug);
        assert_eq!(logging.level_for(3), LogLevel::Error);
        assert_eq!(logging.experiment_level_for(0), LogLevel::Debug);
        assert_eq!(logging.experiment_level_for(1), LogLevel::Info);
        assert_eq!(LevelFilter::from(LogLevel::Warn), LevelFilter::WARN);
    }
}
