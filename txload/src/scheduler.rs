use crate::scenario::ScenarioRunner;
use crate::transport::Transport;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval, Instant, MissedTickBehavior};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};
use tracing::Instrument;
use txload_core::{Stage, SCHEDULER_TICK};

/// Number of workers the ramp asks for `elapsed` into the run, or `None` once the last
/// stage is over.
///
/// Within a stage the target is interpolated linearly from the previous stage's target
/// (or `start`) and rounded toward that previous target, so a ramp never overshoots.
/// Zero-length stages jump straight to their target.
pub fn concurrency_at(start: u32, stages: &[Stage], elapsed: Duration) -> Option<u32> {
    let (index, offset) = stage_at(stages, elapsed)?;
    let from = match index {
        0 => start,
        i => stages[i - 1].target,
    };
    let stage = stages[index];
    let progress = (elapsed - offset).as_secs_f64() / stage.duration.as_secs_f64();
    Some(interpolate(from, stage.target, progress))
}

/// Index and start offset of the stage running at `elapsed`.
fn stage_at(stages: &[Stage], elapsed: Duration) -> Option<(usize, Duration)> {
    let mut offset = Duration::ZERO;
    for (i, stage) in stages.iter().enumerate() {
        let end = offset + stage.duration;
        if elapsed < end {
            return Some((i, offset));
        }
        offset = end;
    }
    None
}

fn interpolate(from: u32, to: u32, progress: f64) -> u32 {
    let exact = from as f64 + (to as f64 - from as f64) * progress.clamp(0., 1.);
    let rounded = if to >= from { exact.floor() } else { exact.ceil() };
    rounded.clamp(from.min(to) as f64, from.max(to) as f64) as u32
}

/// Drives the worker pool through a ramping schedule.
pub struct StageScheduler {
    start: u32,
    stages: Vec<Stage>,
    graceful_stop: Duration,
    tick: Duration,
}

impl StageScheduler {
    pub fn new(start: u32, stages: Vec<Stage>, graceful_stop: Duration) -> Self {
        Self {
            start,
            stages,
            graceful_stop,
            tick: SCHEDULER_TICK,
        }
    }

    /// Returns the peak number of concurrently running workers.
    pub async fn run<T>(&self, runner: Arc<ScenarioRunner<T>>) -> u32
    where
        T: Transport + Send + Sync + 'static,
    {
        let mut pool = WorkerPool::new(runner, None);
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let started = Instant::now();
        let mut stage = None;
        loop {
            ticker.tick().await;
            let elapsed = started.elapsed();

            let Some((index, _)) = stage_at(&self.stages, elapsed) else {
                break;
            };
            if stage != Some(index) {
                let s = self.stages[index];
                info!(
                    "Stage {}/{}: {} workers over {}",
                    index + 1,
                    self.stages.len(),
                    s.target,
                    humantime::format_duration(s.duration)
                );
                stage = Some(index);
            }

            if let Some(target) = concurrency_at(self.start, &self.stages, elapsed) {
                pool.set_concurrency(target as usize);
            }
        }

        let terminal = self.stages.last().map(|s| s.target).unwrap_or(self.start);
        pool.set_concurrency(terminal as usize);
        info!("All stages complete, stopping {} workers", pool.concurrency());
        pool.stop_all();
        pool.join(self.graceful_stop).await
    }
}

/// Runs `workers` workers that each perform `iterations` iterations, giving up on
/// starting new iterations after `max_duration`.
pub async fn run_iterations<T>(
    runner: Arc<ScenarioRunner<T>>,
    workers: u32,
    iterations: u64,
    max_duration: Duration,
    graceful_stop: Duration,
) -> u32
where
    T: Transport + Send + Sync + 'static,
{
    let deadline = Instant::now() + max_duration;
    let mut pool = WorkerPool::new(runner, Some(Budget { iterations, deadline }));
    pool.set_concurrency(workers as usize);
    pool.join(max_duration + graceful_stop).await
}

#[derive(Debug, Clone, Copy)]
struct Budget {
    iterations: u64,
    deadline: Instant,
}

struct Worker {
    stop: watch::Sender<bool>,
    handle: JoinHandle<u64>,
}

/// Spawned workers, each looping over scenario iterations until told to stop.
///
/// Retired workers are signalled rather than aborted so an in-flight iteration always
/// completes and records its metrics.
struct WorkerPool<T> {
    runner: Arc<ScenarioRunner<T>>,
    budget: Option<Budget>,
    active: Vec<Worker>,
    retiring: Vec<JoinHandle<u64>>,
    peak: usize,
}

impl<T> WorkerPool<T>
where
    T: Transport + Send + Sync + 'static,
{
    fn new(runner: Arc<ScenarioRunner<T>>, budget: Option<Budget>) -> Self {
        Self {
            runner,
            budget,
            active: vec![],
            retiring: vec![],
            peak: 0,
        }
    }

    fn concurrency(&self) -> usize {
        self.active.len()
    }

    fn set_concurrency(&mut self, concurrency: usize) {
        if self.active.len() == concurrency {
            return;
        }

        debug!("Adjusting workers from {} to {concurrency}", self.active.len());
        if self.active.len() > concurrency {
            for worker in self.active.drain(concurrency..) {
                // A closed channel means the worker already exited.
                let _ = worker.stop.send(true);
                self.retiring.push(worker.handle);
            }
        } else {
            while self.active.len() < concurrency {
                let id = self.active.len();
                self.active.push(self.spawn(id));
            }
        }

        self.retiring.retain(|h| !h.is_finished());
        self.peak = self.peak.max(self.active.len() + self.retiring.len());
    }

    fn spawn(&self, id: usize) -> Worker {
        let (stop, mut stopped) = watch::channel(false);
        let runner = self.runner.clone();
        let budget = self.budget;

        let handle = tokio::spawn(
            async move {
                let mut done = 0;
                loop {
                    if *stopped.borrow_and_update() {
                        break;
                    }
                    if let Some(budget) = budget {
                        if done >= budget.iterations || Instant::now() >= budget.deadline {
                            break;
                        }
                    }

                    runner.run_iteration().await;
                    done += 1;

                    // Iterations without pauses would otherwise never give the
                    // scheduler a turn.
                    tokio::task::yield_now().await;
                }
                trace!("Worker exiting after {done} iterations");
                done
            }
            .instrument(tracing::debug_span!("worker", id)),
        );

        Worker { stop, handle }
    }

    fn stop_all(&mut self) {
        self.set_concurrency(0);
    }

    /// Wait up to `limit` for every worker to exit, then abort the stragglers. Returns the
    /// peak concurrency.
    async fn join(mut self, limit: Duration) -> u32 {
        let mut handles = std::mem::take(&mut self.retiring);
        handles.extend(self.active.drain(..).map(|w| w.handle));
        let aborts: Vec<AbortHandle> = handles.iter().map(|h| h.abort_handle()).collect();

        match tokio::time::timeout(limit, join_all(handles)).await {
            Ok(results) => {
                let mut iterations = 0;
                for res in results {
                    match res {
                        Ok(done) => iterations += done,
                        Err(err) if err.is_panic() => error!("Worker panicked: {err}"),
                        Err(_) => {}
                    }
                }
                debug!("Workers stopped after {iterations} iterations");
            }
            Err(_) => {
                warn!(
                    "Workers still busy after {}; aborting them",
                    humantime::format_duration(limit)
                );
                for abort in aborts {
                    abort.abort();
                }
            }
        }

        self.peak as u32
    }
}
