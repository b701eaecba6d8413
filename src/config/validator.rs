//! Configuration validation

use super::*;
use crate::error::{Error, Result};

/// Validate complete configuration
pub fn validate_config(config: &HarnessConfig) -> Result<()> {
    validate_file_names(config)?;
    validate_coordinator(&config.coordinator)?;
    Ok(())
}

/// Validate the log and table file names
pub fn validate_file_names(config: &HarnessConfig) -> Result<()> {
    if !config.log_file_name.ends_with(".txt") {
        return Err(Error::InvalidConfig(format!(
            "log file name must end in .txt, got '{}'",
            config.log_file_name
        )));
    }

    if !config.table_file_name.ends_with(".csv") {
        return Err(Error::InvalidConfig(format!(
            "table file name must end in .csv, got '{}'",
            config.table_file_name
        )));
    }

    for name in [&config.log_file_name, &config.table_file_name] {
        if name.contains('/') || name.contains('\\') {
            return Err(Error::InvalidConfig(format!(
                "'{}' must be a file name, not a path",
                name
            )));
        }
    }

    Ok(())
}

/// Validate process group configuration
pub fn validate_coordinator(coordinator: &CoordinatorConfig) -> Result<()> {
    if coordinator.world_size == 0 {
        return Err(Error::InvalidConfig("world_size must be at least 1".to_string()));
    }

    if coordinator.rank >= coordinator.world_size {
        return Err(Error::InvalidConfig(format!(
            "rank {} must be less than world_size {}",
            coordinator.rank, coordinator.world_size
        )));
    }

    if coordinator.world_size > 1 && coordinator.leader_addr.trim().is_empty() {
        return Err(Error::InvalidConfig(
            "leader_addr is required when world_size > 1".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&HarnessConfig::default()).is_ok());
    }

    #[test]
    fn test_log_file_must_be_txt() {
        let config = HarnessConfig {
            log_file_name: "log.log".to_string(),
            ..HarnessConfig::default()
        };
        assert!(matches!(validate_config(&config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_table_file_must_be_csv() {
        let config = HarnessConfig {
            table_file_name: "table.tsv".to_string(),
            ..HarnessConfig::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains(".csv"));
    }

    #[test]
    fn test_file_names_are_not_paths() {
        let config = HarnessConfig {
            table_file_name: "nested/table.csv".to_string(),
            ..HarnessConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rank_bounds() {
        let mut coordinator = CoordinatorConfig::default();
        coordinator.world_size = 2;
        coordinator.rank = 2;
        assert!(validate_coordinator(&coordinator).is_err());

        coordinator.rank = 1;
        assert!(validate_coordinator(&coordinator).is_ok());

        coordinator.world_size = 0;
        coordinator.rank = 0;
        assert!(validate_coordinator(&coordinator).is_err());
    }

    #[test]
    fn test_group_needs_leader_addr() {
        let coordinator = CoordinatorConfig {
            world_size: 2,
            leader_addr: " ".to_string(),
            ..CoordinatorConfig::default()
        };
        assert!(validate_coordinator(&coordinator).is_err());
    }
}
