//! rankrun - coordinated experiment runs across a process group
//!
//! A fixed group of processes runs the same experiment program in lockstep.
//! rankrun gives each run its own results directory, times it with a barrier
//! timer, and appends one row of inputs, outputs and elapsed time to a shared
//! CSV results table. Only the leader (rank 0) touches shared files.
//!
//! # Architecture
//!
//! - **Coordinator**: barrier and broadcast over TCP or in-process channels
//! - **Leader capability**: leader-only APIs take a `&Leader` token
//! - **Schema**: which arguments and outputs become table columns
//! - **Harness**: provisioning, logging, timing and recording around a runner

pub mod config;
pub mod coordinator;
pub mod error;
pub mod harness;
pub mod logging;
pub mod provision;
pub mod schema;
pub mod stats;
pub mod table;
pub mod timer;
pub mod util;
pub mod value;

// Re-export commonly used types
pub use config::HarnessConfig;
pub use coordinator::{Coordinator, Gated, Leader, Role};
pub use error::{Error, Result};
pub use harness::{ExperimentProgram, RunOutputs, RunScope};
pub use schema::{ArgumentMapping, Schema};
pub use stats::Stats;
pub use value::Value;
