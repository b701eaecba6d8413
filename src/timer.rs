//! Barrier timer
//!
//! Measures one shared wall-clock interval across the whole group. Start is
//! `sync`, leader takes a timestamp, `sync`; stop is `sync`, leader measures,
//! `share`. Every rank therefore returns the leader's measurement, bit for bit.
//!
//! The states are separate types: a timer cannot be stopped before it was
//! started, or started twice.

use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::util::time::Timestamp;
use std::time::Duration;
use tracing::debug;

/// Entry point for a timed region
pub struct BarrierTimer;

impl BarrierTimer {
    /// Synchronise and start timing
    pub fn start(coordinator: &mut Coordinator) -> Result<RunningTimer> {
        coordinator.barrier()?;
        let started = coordinator.leader().map(|_| Timestamp::now());
        coordinator.barrier()?;
        debug!(rank = coordinator.rank(), "timer started");
        Ok(RunningTimer { started })
    }
}

/// A started timer; only the leader holds the start timestamp
#[derive(Debug)]
#[must_use = "a started timer should be stopped on every rank"]
pub struct RunningTimer {
    started: Option<Timestamp>,
}

impl RunningTimer {
    /// Synchronise, measure on the leader, and share the elapsed time
    pub fn stop(self, coordinator: &mut Coordinator) -> Result<Duration> {
        coordinator.barrier()?;
        let nanos = self.started.map(|t| t.elapsed_nanos()).unwrap_or(0);
        let nanos: u64 = coordinator.broadcast(nanos)?;
        Ok(Duration::from_nanos(nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_solo_measures_elapsed() {
        let mut coordinator = Coordinator::solo();
        let timer = BarrierTimer::start(&mut coordinator).unwrap();
        thread::sleep(Duration::from_millis(5));
        let elapsed = timer.stop(&mut coordinator).unwrap();
        assert!(elapsed >= Duration::from_millis(5));
    }

    #[test]
    fn test_all_ranks_see_identical_elapsed() {
        let group = Coordinator::local_group(4);
        let elapsed: Vec<Duration> = thread::scope(|s| {
            let handles: Vec<_> = group
                .into_iter()
                .map(|mut c| {
                    s.spawn(move || {
                        let timer = BarrierTimer::start(&mut c).unwrap();
                        // Uneven work per rank
                        thread::sleep(Duration::from_millis(2 * c.rank() as u64));
                        timer.stop(&mut c).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(elapsed.iter().all(|e| *e == elapsed[0]));
        // The slowest rank holds up the stop barrier
        assert!(elapsed[0] >= Duration::from_millis(6));
    }
}
