//! One-call entry point for experiment binaries

use super::{ExperimentProgram, RunOutputs, RunScope};
use crate::config::cli::ExperimentCli;
use crate::config::toml::load_config;
use crate::coordinator::Coordinator;
use crate::schema::Schema;
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

/// Parse the command line as `P`, join the process group and run
///
/// ```no_run
/// use clap::Parser;
/// use rankrun::config::cli::{ExperimentCli, HarnessArgs};
/// use rankrun::schema::{ArgumentMapping, Schema};
/// use serde::Serialize;
///
/// #[derive(Parser, Serialize)]
/// struct Cli {
///     #[command(flatten)]
///     #[serde(skip)]
///     harness: HarnessArgs,
///     #[arg(long, default_value = "0.01")]
///     lr: f64,
/// }
///
/// impl ExperimentCli for Cli {
///     fn harness_args(&self) -> &HarnessArgs {
///         &self.harness
///     }
/// }
///
/// fn main() -> anyhow::Result<()> {
///     let schema = Schema::new(
///         vec![ArgumentMapping::new("lr").column("learning_rate").in_name()],
///         vec![Some("accuracy".to_string())],
///     )?;
///     rankrun::harness::launch::<Cli, _, _>(schema, |_scope, cli| Ok((cli.lr * 10.0,)))?;
///     Ok(())
/// }
/// ```
pub fn launch<P, R, F>(schema: Schema, runner: F) -> Result<R>
where
    P: Parser + Serialize + ExperimentCli,
    R: RunOutputs,
    F: FnOnce(&mut RunScope<'_>, &P) -> Result<R>,
{
    let args = P::parse();
    launch_with(schema, &args, runner)
}

/// `launch` with already-parsed arguments
pub fn launch_with<P, R, F>(schema: Schema, args: &P, runner: F) -> Result<R>
where
    P: Serialize + ExperimentCli,
    R: RunOutputs,
    F: FnOnce(&mut RunScope<'_>, &P) -> Result<R>,
{
    let config = load_config(args.harness_args())?;
    let program = ExperimentProgram::new(schema, config).context("Invalid harness configuration")?;

    let group = &program.config().coordinator;
    let mut coordinator = Coordinator::connect(group).with_context(|| {
        format!(
            "Failed to join process group as rank {} of {} via {}",
            group.rank, group.world_size, group.leader_addr
        )
    })?;

    let output = program.run(&mut coordinator, args, runner)?;
    Ok(output)
}
