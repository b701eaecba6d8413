//! CLI argument parsing using clap
//!
//! `HarnessArgs` is flattened into an experiment's own parser, adding the
//! reserved harness flags next to the experiment's flags:
//!
//! ```
//! use clap::Parser;
//! use rankrun::config::cli::HarnessArgs;
//!
//! #[derive(Parser)]
//! struct Cli {
//!     #[command(flatten)]
//!     harness: HarnessArgs,
//!
//!     /// Learning rate
//!     #[arg(long, default_value = "0.01")]
//!     lr: f64,
//! }
//!
//! let cli = Cli::parse_from(["train", "--lr", "0.1", "-r", "out", "--overwrite"]);
//! assert_eq!(cli.lr, 0.1);
//! assert!(cli.harness.overwrite);
//! ```

use clap::Args;
use std::path::PathBuf;

/// Reserved harness flags
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct HarnessArgs {
    /// Superdirectory in which all results are saved [default: results]
    #[arg(short = 'r', long = "results", value_name = "RESULTS_DIR")]
    pub results: Option<PathBuf>,

    /// Allow overriding an experiment directory
    #[arg(long)]
    pub overwrite: bool,

    /// TOML file with harness settings (CLI flags take precedence)
    #[arg(long, value_name = "FILE")]
    pub harness_config: Option<PathBuf>,

    // === Process group ===
    /// Rank of this process (0 is the leader)
    #[arg(long, env = "RANKRUN_RANK")]
    pub rank: Option<usize>,

    /// Number of cooperating processes
    #[arg(long, env = "RANKRUN_WORLD_SIZE")]
    pub world_size: Option<usize>,

    /// Address the leader listens on (host:port)
    #[arg(long, env = "RANKRUN_LEADER_ADDR")]
    pub leader_addr: Option<String>,
}

/// An experiment's CLI that carries the reserved harness flags
pub trait ExperimentCli {
    fn harness_args(&self) -> &HarnessArgs;
}
