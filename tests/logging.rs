//! Shared and experiment logs written by a real run
//!
//! The global subscriber can be installed once per process, so everything
//! here runs as a single test.

use rankrun::config::HarnessConfig;
use rankrun::schema::{ArgumentMapping, Schema};
use rankrun::{Coordinator, ExperimentProgram};
use serde::Serialize;
use std::fs;
use tempfile::TempDir;

#[derive(Serialize)]
struct Args {
    lr: f64,
    seed: u64,
}

#[test]
fn solo_run_splits_shared_and_experiment_logs() {
    let dir = TempDir::new().unwrap();
    let mut config = HarnessConfig {
        results_dir: dir.path().join("results"),
        ..HarnessConfig::default()
    };
    config.logging.console = false;

    let schema = Schema::new(
        vec![
            ArgumentMapping::new("lr").column("learning_rate").in_name(),
            ArgumentMapping::new("seed"),
        ],
        vec![Some("loss".to_string())],
    )
    .unwrap();
    let program = ExperimentProgram::new(schema, config).unwrap();
    let mut coordinator = Coordinator::solo();
    let args = Args { lr: 0.25, seed: 7 };

    program
        .run(&mut coordinator, &args, |_, _| {
            tracing::info!(target: "experiment", "epoch 1 done");
            tracing::debug!(target: "experiment", "gradient norm 0.5");
            tracing::info!("runner checkpoint");
            Ok((0.125,))
        })
        .unwrap();

    let shared = fs::read_to_string(dir.path().join("results/log.txt")).unwrap();
    assert!(shared.lines().all(|line| line.starts_with("[0] ")), "{}", shared);
    assert!(shared.contains("Detected number of processes: 1"));
    assert!(shared.contains("learning_rate: 0.25"));
    assert!(shared.contains("seed: 7"));
    assert!(shared.contains("Beginning run now."));
    assert!(shared.contains("Finished run. Took"));
    assert!(shared.contains("runner checkpoint"));
    // Leader default is debug
    assert!(shared.contains("DEBUG"));
    assert!(!shared.contains("epoch 1 done"));
    assert!(!shared.contains("gradient norm"));
    assert!(!shared.contains("\x1b["));

    let experiment = fs::read_to_string(dir.path().join("results/0.25/output0.txt")).unwrap();
    assert!(experiment.contains("epoch 1 done"));
    assert!(experiment.contains("gradient norm 0.5"));
    assert!(!experiment.contains("[0] "));
    assert!(!experiment.contains("runner checkpoint"));
    assert!(!experiment.contains("Beginning run now."));
}
