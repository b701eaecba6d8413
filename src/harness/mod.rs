//! Run harness
//!
//! Wraps one experiment run on every rank of the group:
//!
//! 1. capture the run arguments and derive the directory name fields
//! 2. provision the experiment directory and write its field manifest
//! 3. install logging, open the results table (leader only)
//! 4. time the runner with a barrier timer
//! 5. append `inputs ++ outputs ++ [time]` to the table (leader only)
//!
//! Leader-side failures in steps 2, 3 and 5 are broadcast, so every rank
//! stops at the same point with an error.

pub mod launch;
pub mod outputs;

pub use launch::{launch, launch_with};
pub use outputs::RunOutputs;

use crate::config::validator::validate_config;
use crate::config::HarnessConfig;
use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::logging;
use crate::provision::{provision_experiment_dir, write_field_meanings};
use crate::schema::{RunArguments, Schema};
use crate::table::open_with_fallback;
use crate::timer::BarrierTimer;
use crate::util::time::format_duration;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// A validated schema and harness configuration, ready to run
#[derive(Debug, Clone)]
pub struct ExperimentProgram {
    schema: Schema,
    config: HarnessConfig,
}

impl ExperimentProgram {
    /// Check the configuration; nothing touches the filesystem yet
    pub fn new(schema: Schema, config: HarnessConfig) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self { schema, config })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run `runner` once on this rank as part of the group
    ///
    /// Every rank must call this with the same arguments. Returns the
    /// runner's value unchanged.
    pub fn run<A, R, F>(&self, coordinator: &mut Coordinator, args: &A, runner: F) -> Result<R>
    where
        A: Serialize,
        R: RunOutputs,
        F: FnOnce(&mut RunScope<'_>, &A) -> anyhow::Result<R>,
    {
        let run_args = RunArguments::capture(args)?;
        let (fields, meanings) = self.schema.naming_fields(&run_args)?;

        let exp_dir = provision_experiment_dir(
            coordinator,
            &self.config.results_dir,
            &fields,
            self.config.overwrite,
        )?;
        coordinator.leader_only("write field meanings", |leader| {
            write_field_meanings(leader, &exp_dir, &meanings)
        })?;

        let logging_config = &self.config.logging;
        if logging_config.enabled {
            logging::install(coordinator.rank(), logging_config, &self.config.log_file_path())?;
        }

        let table_path = self.config.table_path();
        let mut table = coordinator.leader_only("open results table", |leader| {
            open_with_fallback(leader, &table_path, self.schema.columns())
        })?;

        info!("Detected number of processes: {}", coordinator.world_size());
        for mapping in self.schema.arguments() {
            let label = mapping.column.as_deref().unwrap_or(&mapping.arg);
            info!("{}: {}", label, run_args.get(&mapping.arg)?);
        }

        let _experiment_log = if logging_config.enabled && logging_config.experiment_log {
            Some(logging::attach_experiment_log(&exp_dir, coordinator.rank())?)
        } else {
            None
        };

        info!("Beginning run now.");
        let timer = BarrierTimer::start(coordinator)?;
        let output = {
            let mut scope = RunScope {
                exp_dir: &exp_dir,
                coordinator: &mut *coordinator,
            };
            runner(&mut scope, args).map_err(Error::Runner)?
        };
        let elapsed = timer.stop(coordinator)?;
        info!("Finished run. Took {} to complete", format_duration(elapsed));

        coordinator.leader_only("record results", |_| match table.as_mut() {
            Some(table) => {
                let row = self.schema.row(&run_args, output.output_values(), elapsed.as_secs_f64())?;
                table.add_row(row);
                table.save()
            }
            None => Ok(()),
        })?;

        Ok(output)
    }
}

/// What a runner sees of the harness
pub struct RunScope<'a> {
    exp_dir: &'a Path,
    coordinator: &'a mut Coordinator,
}

impl<'a> RunScope<'a> {
    /// This run's experiment directory, shared by every rank
    pub fn exp_dir(&self) -> &Path {
        self.exp_dir
    }

    /// Coordinator for the runner's own barriers and broadcasts
    pub fn coordinator(&mut self) -> &mut Coordinator {
        self.coordinator
    }

    pub fn rank(&self) -> usize {
        self.coordinator.rank()
    }

    pub fn world_size(&self) -> usize {
        self.coordinator.world_size()
    }

    pub fn is_leader(&self) -> bool {
        self.coordinator.is_leader()
    }
}

/// Final path component of `path`, for naming a run after an input file
///
/// ```
/// use rankrun::harness::sanitize_filename;
///
/// assert_eq!(sanitize_filename(Some("/data/sets/mnist.bin")), Some("mnist.bin".to_string()));
/// assert_eq!(sanitize_filename(None), None);
/// ```
pub fn sanitize_filename(path: Option<&str>) -> Option<String> {
    path.map(|p| {
        PathBuf::from(p)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| p.to_string())
    })
}
