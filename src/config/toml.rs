//! TOML configuration file parsing

use super::cli::HarnessArgs;
use super::HarnessConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<HarnessConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<HarnessConfig> {
    let config: HarnessConfig = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &HarnessArgs, mut config: HarnessConfig) -> HarnessConfig {
    if let Some(ref results) = cli.results {
        config.results_dir = results.clone();
    }
    if cli.overwrite {
        config.overwrite = true;
    }

    // Process group
    if let Some(rank) = cli.rank {
        config.coordinator.rank = rank;
    }
    if let Some(world_size) = cli.world_size {
        config.coordinator.world_size = world_size;
    }
    if let Some(ref addr) = cli.leader_addr {
        config.coordinator.leader_addr = addr.clone();
    }

    config
}

/// Build the effective configuration for a run
///
/// Loads `--harness-config` when given, otherwise starts from defaults, then
/// applies the CLI flags.
pub fn load_config(cli: &HarnessArgs) -> Result<HarnessConfig> {
    let base = match cli.harness_config {
        Some(ref path) => parse_toml_file(path)?,
        None => HarnessConfig::default(),
    };
    Ok(merge_cli_with_config(cli, base))
}
