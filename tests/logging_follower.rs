//! Default log thresholds on a follower rank

use rankrun::config::LoggingConfig;
use rankrun::logging;
use std::fs;
use tempfile::TempDir;

#[test]
fn follower_logs_only_errors_to_shared_log() {
    let dir = TempDir::new().unwrap();
    let log_file = dir.path().join("log.txt");
    let config = LoggingConfig {
        console: false,
        ..LoggingConfig::default()
    };

    assert!(logging::install(1, &config, &log_file).unwrap());
    // Second install is a no-op
    assert!(!logging::install(1, &config, &log_file).unwrap());

    let guard = logging::attach_experiment_log(dir.path(), 1).unwrap();
    tracing::info!("follower progress");
    tracing::warn!("follower warning");
    tracing::error!("follower failure");
    tracing::info!(target: "experiment", "follower epoch done");
    tracing::debug!(target: "experiment", "follower detail");
    drop(guard);

    let shared = fs::read_to_string(&log_file).unwrap();
    let lines: Vec<&str> = shared.lines().collect();
    assert_eq!(lines.len(), 1, "{}", shared);
    assert!(lines[0].starts_with("[1] "));
    assert!(lines[0].contains("ERROR"));
    assert!(lines[0].ends_with("follower failure"));

    let experiment = fs::read_to_string(dir.path().join("output1.txt")).unwrap();
    assert!(experiment.contains("follower epoch done"));
    assert!(!experiment.contains("follower detail"));
    assert!(!experiment.contains("follower failure"));
}
