use rankrun::config::HarnessConfig;
use rankrun::provision::read_field_meanings;
use rankrun::schema::{ArgumentMapping, Schema};
use rankrun::table::read_table;
use rankrun::{Coordinator, Error, ExperimentProgram, Value};
use serde::Serialize;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Serialize)]
struct TrainArgs {
    lr: f64,
    data: String,
}

fn config(dir: &Path) -> HarnessConfig {
    let mut config = HarnessConfig {
        results_dir: dir.join("results"),
        ..HarnessConfig::default()
    };
    config.logging.enabled = false;
    config
}

fn lr_schema() -> Schema {
    Schema::new(
        vec![
            ArgumentMapping::new("lr").column("learning_rate").in_name(),
            ArgumentMapping::new("data").in_name_with(|v| {
                rankrun::harness::sanitize_filename(v.as_str()).unwrap_or_default()
            }),
        ],
        vec![Some("accuracy".to_string())],
    )
    .unwrap()
}

/// Run `program` on `world_size` threads, one rank each
fn run_group(program: &ExperimentProgram, world_size: usize, args: &TrainArgs) -> Vec<rankrun::Result<(f64,)>> {
    let group = Coordinator::local_group(world_size);
    thread::scope(|s| {
        let handles: Vec<_> = group
            .into_iter()
            .map(|mut coordinator| {
                s.spawn(move || {
                    program.run(&mut coordinator, args, |scope, _| {
                        // Uneven work per rank
                        thread::sleep(Duration::from_millis(3 * scope.rank() as u64));
                        Ok((0.95,))
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn multi_rank_run_appends_one_row() {
    let dir = TempDir::new().unwrap();
    let program = ExperimentProgram::new(lr_schema(), config(dir.path())).unwrap();
    let args = TrainArgs {
        lr: 0.01,
        data: "/datasets/mnist.bin".to_string(),
    };

    let results = run_group(&program, 3, &args);
    for result in results {
        assert_eq!(result.unwrap(), (0.95,));
    }

    let exp_dir = dir.path().join("results/0.01-mnist.bin");
    assert!(exp_dir.is_dir());
    assert_eq!(read_field_meanings(&exp_dir).unwrap(), vec!["lr", "data"]);

    let (columns, rows) = read_table(&dir.path().join("results/table.csv")).unwrap();
    assert_eq!(columns, vec!["learning_rate", "accuracy", "time"]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::Float(0.01));
    assert_eq!(rows[0][1], Value::Float(0.95));
    // The slowest rank holds the timer open
    assert!(rows[0][2].as_f64().unwrap() >= 0.006);
}

#[test]
fn rerun_fails_on_every_rank() {
    let dir = TempDir::new().unwrap();
    let program = ExperimentProgram::new(lr_schema(), config(dir.path())).unwrap();
    let args = TrainArgs {
        lr: 0.1,
        data: "cifar".to_string(),
    };

    assert!(run_group(&program, 2, &args).into_iter().all(|r| r.is_ok()));

    for result in run_group(&program, 2, &args) {
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    let (_, rows) = read_table(&dir.path().join("results/table.csv")).unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn new_schema_falls_back_to_suffixed_table() {
    let dir = TempDir::new().unwrap();
    let args = TrainArgs {
        lr: 0.5,
        data: "a".to_string(),
    };

    let first = ExperimentProgram::new(lr_schema(), config(dir.path())).unwrap();
    assert!(run_group(&first, 2, &args).into_iter().all(|r| r.is_ok()));

    let renamed = Schema::new(
        vec![
            ArgumentMapping::new("lr").column("lr").in_name(),
            ArgumentMapping::new("data").in_name(),
        ],
        vec![Some("acc".to_string())],
    )
    .unwrap();
    let mut second_config = config(dir.path());
    second_config.overwrite = true;
    let second = ExperimentProgram::new(renamed, second_config).unwrap();
    assert!(run_group(&second, 2, &args).into_iter().all(|r| r.is_ok()));

    let (original, rows) = read_table(&dir.path().join("results/table.csv")).unwrap();
    assert_eq!(original, vec!["learning_rate", "accuracy", "time"]);
    assert_eq!(rows.len(), 1);

    let (fallback, rows) = read_table(&dir.path().join("results/table_2.csv")).unwrap();
    assert_eq!(fallback, vec!["lr", "acc", "time"]);
    assert_eq!(rows.len(), 1);
}

#[test]
fn solo_run_needs_no_network() {
    let dir = TempDir::new().unwrap();
    let program = ExperimentProgram::new(lr_schema(), config(dir.path())).unwrap();
    let mut coordinator = Coordinator::solo();
    let args = TrainArgs {
        lr: 0.2,
        data: "b".to_string(),
    };

    let value = program
        .run(&mut coordinator, &args, |scope, args| {
            assert_eq!(scope.world_size(), 1);
            Ok((args.lr * 2.0,))
        })
        .unwrap();
    assert_eq!(value, (0.4,));
}

#[test]
fn timer_elapsed_is_identical_on_every_rank() {
    use rankrun::timer::BarrierTimer;

    let group = Coordinator::local_group(4);
    let elapsed: Vec<Duration> = thread::scope(|s| {
        let handles: Vec<_> = group
            .into_iter()
            .map(|mut coordinator| {
                s.spawn(move || {
                    let timer = BarrierTimer::start(&mut coordinator).unwrap();
                    thread::sleep(Duration::from_millis(coordinator.rank() as u64));
                    timer.stop(&mut coordinator).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(elapsed.windows(2).all(|pair| pair[0] == pair[1]));
}
