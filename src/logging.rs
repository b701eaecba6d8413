//! Logging setup
//!
//! One global `tracing` subscriber per process with three sinks:
//!
//! - console (optional) and the shared log file under the results directory,
//!   every line prefixed with `[rank] `, verbose on the leader and quiet on
//!   followers by default
//! - the experiment log: events with target `experiment` go, unprefixed, to
//!   `output{rank}.txt` in whichever experiment directory is attached
//!
//! Runner code writes to its experiment log with
//! `tracing::info!(target: "experiment", ...)`.

use crate::config::LoggingConfig;
use crate::error::Result;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::format::{Format, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Target routed to the per-process experiment log
pub const EXPERIMENT_TARGET: &str = "experiment";

/// Default event format with a `[rank] ` prefix
struct RankPrefixed {
    rank: usize,
    inner: Format,
}

impl RankPrefixed {
    fn new(rank: usize) -> Self {
        Self {
            rank,
            inner: Format::default(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for RankPrefixed
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        write!(writer, "[{}] ", self.rank)?;
        self.inner.format_event(ctx, writer, event)
    }
}

/// Install the global subscriber for `rank`
///
/// Appends to `log_file`, which must be in an existing directory. Returns
/// `Ok(false)` without changing anything if a subscriber was already set.
pub fn install(rank: usize, config: &LoggingConfig, log_file: &Path) -> Result<bool> {
    let shared = Targets::new()
        .with_default(LevelFilter::from(config.level_for(rank)))
        .with_target(EXPERIMENT_TARGET, LevelFilter::OFF);

    let console = config.console.then(|| {
        tracing_subscriber::fmt::layer()
            .event_format(RankPrefixed::new(rank))
            .with_filter(shared.clone())
    });

    let file = OpenOptions::new().create(true).append(true).open(log_file)?;
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .event_format(RankPrefixed::new(rank))
        .with_filter(shared);

    let experiment = config.experiment_log.then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(ExperimentSink)
            .with_filter(
                Targets::new().with_target(EXPERIMENT_TARGET, LevelFilter::from(config.experiment_level_for(rank))),
            )
    });

    let installed = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .with(experiment)
        .try_init()
        .is_ok();
    Ok(installed)
}

/// The file experiment events are currently written to, if any
static EXPERIMENT_FILE: Mutex<Option<File>> = Mutex::new(None);

fn experiment_file() -> MutexGuard<'static, Option<File>> {
    EXPERIMENT_FILE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writer for the experiment layer; discards output while detached
#[derive(Debug, Clone, Copy, Default)]
pub struct ExperimentSink;

impl Write for ExperimentSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match experiment_file().as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match experiment_file().as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for ExperimentSink {
    type Writer = ExperimentSink;

    fn make_writer(&'a self) -> Self::Writer {
        ExperimentSink
    }
}

/// Keeps an experiment log attached; detaches on drop
#[derive(Debug)]
#[must_use = "the experiment log detaches when the guard is dropped"]
pub struct ExperimentLogGuard {
    path: PathBuf,
}

impl ExperimentLogGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExperimentLogGuard {
    fn drop(&mut self) {
        if let Some(mut file) = experiment_file().take() {
            let _ = file.flush();
        }
    }
}

/// Route experiment events to `dir/output{rank}.txt` (appending)
///
/// Replaces any previously attached file; one experiment log per process.
pub fn attach_experiment_log(dir: &Path, rank: usize) -> Result<ExperimentLogGuard> {
    let path = dir.join(format!("output{}.txt", rank));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    *experiment_file() = Some(file);
    Ok(ExperimentLogGuard { path })
}
