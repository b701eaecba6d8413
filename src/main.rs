//! rankrun demo: Monte-Carlo estimate of pi split across a process group
//!
//! Single process:
//!
//! ```text
//! rankrun --samples 1000000 --seed 7 --label quick
//! ```
//!
//! Four processes on one host:
//!
//! ```text
//! for r in 0 1 2 3; do
//!     RANKRUN_RANK=$r RANKRUN_WORLD_SIZE=4 rankrun --samples 4000000 &
//! done; wait
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rankrun::config::cli::{ExperimentCli, HarnessArgs};
use rankrun::harness::{launch, sanitize_filename, RunScope};
use rankrun::schema::{ArgumentMapping, Schema};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Parser, Serialize, Debug)]
#[command(name = "rankrun")]
#[command(version, about = "Estimate pi by sampling the unit square across a process group")]
struct Cli {
    #[command(flatten)]
    #[serde(skip)]
    harness: HarnessArgs,

    /// Total number of points sampled by the whole group
    #[arg(long, default_value = "1000000")]
    samples: u64,

    /// Base RNG seed; rank r uses seed + r
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Free-form label, part of the experiment directory name
    #[arg(long, default_value = "pi")]
    label: String,
}

impl ExperimentCli for Cli {
    fn harness_args(&self) -> &HarnessArgs {
        &self.harness
    }
}

/// One rank's share of the sampling
#[derive(Debug, Serialize, Deserialize)]
struct Partial {
    rank: usize,
    samples: u64,
    hits: u64,
}

fn main() -> Result<()> {
    let schema = Schema::new(
        vec![
            ArgumentMapping::new("samples").column("samples").in_name(),
            ArgumentMapping::new("seed").column("seed").in_name(),
            ArgumentMapping::new("label").in_name_with(|v| {
                sanitize_filename(v.as_str()).unwrap_or_else(|| v.to_string())
            }),
        ],
        vec![Some("pi".to_string()), Some("abs_error".to_string()), None],
    )?;

    let (pi, abs_error, hits) = launch::<Cli, _, _>(schema, estimate_pi)?;
    println!("pi ~= {:.6} (error {:.2e}, {} local hits)", pi, abs_error, hits);
    Ok(())
}

fn estimate_pi(scope: &mut RunScope<'_>, cli: &Cli) -> Result<(f64, f64, u64)> {
    let rank = scope.rank();
    let world_size = scope.world_size() as u64;

    let share = cli.samples / world_size + u64::from((rank as u64) < cli.samples % world_size);
    let mut rng = StdRng::seed_from_u64(cli.seed.wrapping_add(rank as u64));
    let hits = (0..share)
        .filter(|_| {
            let (x, y): (f64, f64) = (rng.gen(), rng.gen());
            x * x + y * y <= 1.0
        })
        .count() as u64;

    info!(target: "experiment", "rank {} sampled {} points, {} inside", rank, share, hits);
    let partial = Partial {
        rank,
        samples: share,
        hits,
    };
    let partial_path = scope.exp_dir().join(format!("partial{}.json", rank));
    fs::write(&partial_path, serde_json::to_vec(&partial)?)
        .with_context(|| format!("Failed to write {}", partial_path.display()))?;

    scope.coordinator().barrier()?;

    let estimate = if scope.is_leader() {
        combine_partials(scope.exp_dir(), scope.world_size())?
    } else {
        0.0
    };
    let pi = scope.coordinator().broadcast(estimate)?;

    Ok((pi, (pi - PI).abs(), hits))
}

/// Leader: read every rank's partial and form the group estimate
fn combine_partials(dir: &Path, world_size: usize) -> Result<f64> {
    let mut samples = 0u64;
    let mut hits = 0u64;
    for rank in 0..world_size {
        let path = dir.join(format!("partial{}.json", rank));
        let bytes = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let partial: Partial =
            serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {}", path.display()))?;
        anyhow::ensure!(
            partial.rank == rank,
            "{} holds the partial of rank {}",
            path.display(),
            partial.rank
        );
        samples += partial.samples;
        hits += partial.hits;
    }

    if samples == 0 {
        return Ok(0.0);
    }
    Ok(4.0 * hits as f64 / samples as f64)
}
