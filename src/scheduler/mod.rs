//! Scheduler Driver: one background loop per job kind.
//!
//! Each loop ticks on its own interval. A run holds its job's lock for its
//! whole duration, so a tick or a manual `run_now` that finds the lock held
//! is coalesced instead of stacked. Runs execute in their own task; an error
//! or panic ends that run only.


use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::{Engine, JobKind, PassReport};

/// Result of one triggered run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunOutcome {
    Completed { report: PassReport },
    Failed { error: String },
    /// The job was already running; this trigger was coalesced.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub job: JobKind,
    pub interval_secs: u64,
    pub next_run: Option<NaiveDateTime>,
    pub last_run: Option<NaiveDateTime>,
    pub last_outcome: Option<RunOutcome>,
    pub in_flight: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub jobs: Vec<JobStatus>,
}

#[derive(Default)]
struct JobTimes {
    next_run: Option<NaiveDateTime>,
    last_run: Option<NaiveDateTime>,
    last_outcome: Option<RunOutcome>,
}

struct Job {
    kind: JobKind,
    interval: Duration,
    /// Held by the run in flight.
    lock: Arc<Mutex<()>>,
    times: Mutex<JobTimes>,
    current: Mutex<Option<AbortHandle>>,
}

impl Job {
    fn new(kind: JobKind, interval: Duration) -> Self {
        Self {
            kind,
            interval,
            lock: Arc::new(Mutex::new(())),
            times: Mutex::new(JobTimes::default()),
            current: Mutex::new(None),
        }
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    loops: Vec<JoinHandle<()>>,
}

/// Owns the job loops. `STOPPED -> RUNNING -> STOPPED`.
pub struct Scheduler {
    engine: Arc<Engine>,
    jobs: [Arc<Job>; 3],
    grace: Duration,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(engine: Arc<Engine>) -> Self {
        let config = &engine.config().scheduler;
        let jobs = JobKind::ALL.map(|kind| {
            let secs = match kind {
                JobKind::Feed => config.feed_interval_secs,
                JobKind::Followup => config.followup_interval_secs,
                JobKind::Expiry => config.expiry_interval_secs,
            };
            Arc::new(Job::new(kind, Duration::from_secs(secs)))
        });
        let grace = Duration::from_secs(config.shutdown_grace_secs);
        Self {
            engine,
            jobs,
            grace,
            running: Mutex::new(None),
        }
    }

    fn job(&self, kind: JobKind) -> &Arc<Job> {
        &self.jobs[kind as usize]
    }

    /// Spawn one loop per job kind. Returns false if already running.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.is_some() {
            warn!("scheduler: start requested while already running");
            return false;
        }

        let (shutdown, rx) = watch::channel(false);
        let loops = self
            .jobs
            .iter()
            .map(|job| {
                tokio::spawn(job_loop(self.engine.clone(), job.clone(), rx.clone()))
            })
            .collect();
        *running = Some(Running { shutdown, loops });

        info!(
            "scheduler: started (feed every {}s, followup every {}s, expiry every {}s)",
            self.job(JobKind::Feed).interval.as_secs(),
            self.job(JobKind::Followup).interval.as_secs(),
            self.job(JobKind::Expiry).interval.as_secs()
        );
        true
    }

    /// Signal all loops, wait up to the grace period for in-flight runs,
    /// then abort whatever is left.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        info!("scheduler: stopping");
        let _ = running.shutdown.send(true);

        let mut loops = running.loops;
        let handles: Vec<AbortHandle> = loops.iter().map(JoinHandle::abort_handle).collect();
        let drain = async {
            for handle in loops.iter_mut() {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(self.grace, drain).await.is_err() {
            warn!(
                "scheduler: runs still in flight after {}s, aborting",
                self.grace.as_secs()
            );
            for handle in &handles {
                handle.abort();
            }
            for job in &self.jobs {
                if let Some(run) = job.current.lock().await.take() {
                    run.abort();
                }
            }
        }

        for job in &self.jobs {
            job.times.lock().await.next_run = None;
        }
        info!("scheduler: stopped");
    }

    /// Run one job now, outside its schedule.
    pub async fn run_now(&self, kind: JobKind) -> RunOutcome {
        let job = self.job(kind);
        match job.lock.clone().try_lock_owned() {
            Ok(guard) => execute(&self.engine, job, guard).await,
            Err(_) => {
                info!("scheduler: {kind} already running, manual run skipped");
                RunOutcome::Skipped
            }
        }
    }

    pub async fn status(&self) -> SchedulerStatus {
        let running = self.running.lock().await.is_some();
        let mut jobs = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            let times = job.times.lock().await;
            jobs.push(JobStatus {
                job: job.kind,
                interval_secs: job.interval.as_secs(),
                next_run: times.next_run,
                last_run: times.last_run,
                last_outcome: times.last_outcome.clone(),
                in_flight: job.lock.try_lock().is_err(),
            });
        }
        SchedulerStatus { running, jobs }
    }
}

async fn job_loop(engine: Arc<Engine>, job: Arc<Job>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(job.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let step =
        chrono::Duration::from_std(job.interval).unwrap_or_else(|_| chrono::Duration::zero());
    job.times.lock().await.next_run = Some(engine.now());

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        match job.lock.clone().try_lock_owned() {
            Ok(guard) => {
                execute(&engine, &job, guard).await;
            }
            Err(_) => debug!("scheduler: {} still running, tick coalesced", job.kind),
        }
        job.times.lock().await.next_run = Some(engine.now() + step);
    }
    debug!("scheduler: {} loop exited", job.kind);
}

/// Execute one run in its own task. `guard` is released when the task ends,
/// including on panic.
async fn execute(engine: &Arc<Engine>, job: &Job, guard: OwnedMutexGuard<()>) -> RunOutcome {
    let kind = job.kind;
    let run_id = Uuid::new_v4().simple().to_string()[..8].to_string();
    job.times.lock().await.last_run = Some(engine.now());
    info!("scheduler: {kind} run {run_id} started");

    let task_engine = engine.clone();
    let handle = tokio::spawn(async move {
        let _guard = guard;
        task_engine.run_job(kind).await
    });
    *job.current.lock().await = Some(handle.abort_handle());

    let outcome = match handle.await {
        Ok(Ok(report)) => {
            info!("scheduler: {kind} run {run_id} done: {report}");
            RunOutcome::Completed { report }
        }
        Ok(Err(e)) => {
            error!("scheduler: {kind} run {run_id} failed: {e}");
            RunOutcome::Failed {
                error: e.to_string(),
            }
        }
        Err(e) if e.is_panic() => {
            error!("scheduler: {kind} run {run_id} panicked");
            RunOutcome::Failed {
                error: "run panicked".to_string(),
            }
        }
        Err(_) => {
            warn!("scheduler: {kind} run {run_id} cancelled");
            RunOutcome::Failed {
                error: "run cancelled".to_string(),
            }
        }
    };

    *job.current.lock().await = None;
    job.times.lock().await.last_outcome = Some(outcome.clone());
    outcome
}
