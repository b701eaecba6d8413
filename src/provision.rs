//! Experiment directory provisioning
//!
//! Each run gets its own directory under the results superdirectory, named by
//! joining the naming fields with `-`. The leader alone checks and creates it,
//! then broadcasts what happened, so every rank agrees on whether the run may
//! proceed.

use crate::coordinator::{Coordinator, Leader};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Manifest mapping directory name components back to argument names
pub const FIELD_MEANINGS_FILE: &str = "field_meanings.txt";

/// Result of the leader's check-and-create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisionOutcome {
    Created,
    /// Already present and `overwrite` was set
    Reused,
    /// Already present and `overwrite` was not set
    Exists,
    Failed(String),
}

/// `base/<fields joined by "-">`, or `base` itself when there are no fields
pub fn experiment_dir_path(base: &Path, fields: &[String]) -> PathBuf {
    if fields.is_empty() {
        base.to_path_buf()
    } else {
        base.join(fields.join("-"))
    }
}

/// Create the experiment directory for `fields`, agreeing on the outcome
/// across the group
///
/// Every rank returns the same path, or the same error. An existing directory
/// is fatal unless `overwrite` is set, in which case it is reused as is.
pub fn provision_experiment_dir(
    coordinator: &mut Coordinator,
    base: &Path,
    fields: &[String],
    overwrite: bool,
) -> Result<PathBuf> {
    let path = experiment_dir_path(base, fields);

    let outcome = coordinator.on_leader(|_| {
        if path.exists() {
            if overwrite {
                ProvisionOutcome::Reused
            } else {
                ProvisionOutcome::Exists
            }
        } else {
            match fs::create_dir_all(&path) {
                Ok(()) => ProvisionOutcome::Created,
                Err(e) => ProvisionOutcome::Failed(e.to_string()),
            }
        }
    })?;

    match outcome {
        ProvisionOutcome::Created => {
            debug!("Created experiment directory {}", path.display());
            Ok(path)
        }
        ProvisionOutcome::Reused => {
            if coordinator.is_leader() {
                warn!(
                    "{} already exists; overwrite is set, reusing it without clearing",
                    path.display()
                );
            }
            Ok(path)
        }
        ProvisionOutcome::Exists => Err(Error::AlreadyExists(path)),
        ProvisionOutcome::Failed(message) => Err(Error::LeaderFailed {
            step: format!("create {}", path.display()),
            message,
        }),
    }
}

/// Write the naming-field source names, one per line
pub fn write_field_meanings(_leader: &Leader, dir: &Path, names: &[String]) -> Result<PathBuf> {
    let path = dir.join(FIELD_MEANINGS_FILE);
    fs::write(&path, names.join("\n"))?;
    Ok(path)
}

/// Read back a manifest written by `write_field_meanings`
pub fn read_field_meanings(dir: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(dir.join(FIELD_MEANINGS_FILE))?;
    if contents.is_empty() {
        return Ok(Vec::new());
    }
    Ok(contents.split('\n').map(str::to_string).collect())
}
