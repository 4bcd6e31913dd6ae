pub mod queue;
pub mod state;

use crate::common::config::CoordinatorConfig;
use crate::common::error::{DispatchError, Result};
use crate::common::types::{
    CoordinatorStats, Job, JobReport, JobStatus, SourceRef, Task, TaskResult, WorkerLoad,
};
use crate::translate::Translator;
use crate::worker::Worker;
use chrono::Utc;
use futures::future::join_all;
use state::{validate_languages, CoordinatorState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handle workers use to report task outcomes back to the coordinator.
#[derive(Clone)]
pub struct CompletionSink {
    state: Arc<RwLock<CoordinatorState>>,
}

impl CompletionSink {
    pub async fn task_completed(&self, task_id: &str, result: TaskResult) {
        let summary = result.summary();
        let applied = self.state.write().await.complete(task_id, result, Utc::now());

        if applied {
            info!(
                task_id,
                successful = summary.successful,
                failed = summary.failed,
                "task completed"
            );
        } else {
            warn!(task_id, "completion ignored, task is no longer active");
        }
    }

    pub async fn task_failed(&self, task_id: &str, error: String) {
        let applied = self.state.write().await.fail(task_id, error.clone(), Utc::now());

        if applied {
            warn!(task_id, %error, "task failed");
        } else {
            warn!(task_id, %error, "failure ignored, task is no longer active");
        }
    }
}

/// Owns the task queue and partitions, the worker pool and the control loops.
pub struct Coordinator {
    config: CoordinatorConfig,
    state: Arc<RwLock<CoordinatorState>>,
    workers: Vec<Arc<Worker>>,
    loops: Mutex<Vec<JoinHandle<()>>>,
    stop_loops: watch::Sender<bool>,
}

impl Coordinator {
    /// Builds the coordinator and its worker pool without starting anything.
    pub fn new(config: CoordinatorConfig, translator: Arc<dyn Translator>) -> Result<Self> {
        if config.max_workers == 0 || config.worker_capacity == 0 || config.max_languages_per_task == 0 {
            return Err(DispatchError::InvalidConfig(
                "workers, capacity and languages per task must all be at least 1".to_string(),
            ));
        }

        let state = Arc::new(RwLock::new(CoordinatorState::new()));
        let sink = CompletionSink {
            state: Arc::clone(&state),
        };

        let workers = (0..config.max_workers)
            .map(|i| {
                Arc::new(Worker::new(
                    format!("worker-{}", i),
                    config.worker_capacity,
                    config.worker_poll_interval,
                    Arc::clone(&translator),
                    sink.clone(),
                ))
            })
            .collect();

        Ok(Coordinator {
            config,
            state,
            workers,
            loops: Mutex::new(Vec::new()),
            stop_loops: watch::channel(false).0,
        })
    }

    /// Builds the coordinator, starts every worker and both control loops.
    pub async fn initialize(config: CoordinatorConfig, translator: Arc<dyn Translator>) -> Result<Self> {
        let coordinator = Self::new(config, translator)?;
        coordinator.start().await;
        Ok(coordinator)
    }

    pub async fn start(&self) {
        let mut loops = self.loops.lock().await;
        if !loops.is_empty() {
            return;
        }

        for worker in &self.workers {
            worker.start().await;
        }
        self.stop_loops.send_replace(false);

        let state = Arc::clone(&self.state);
        let workers = self.workers.clone();
        let balance = self.config.enable_load_balancing;
        loops.push(spawn_periodic(self.config.assignment_interval, self.stop_loops.subscribe(), move || {
            let state = Arc::clone(&state);
            let workers = workers.clone();
            async move {
                assign_pending(&state, &workers, balance).await;
            }
        }));

        let state = Arc::clone(&self.state);
        let task_timeout = self.config.task_timeout;
        loops.push(spawn_periodic(self.config.timeout_sweep_interval, self.stop_loops.subscribe(), move || {
            let state = Arc::clone(&state);
            async move {
                sweep_timeouts(&state, task_timeout).await;
            }
        }));

        info!(
            workers = self.workers.len(),
            capacity = self.config.worker_capacity,
            load_balancing = self.config.enable_load_balancing,
            "coordinator started"
        );
    }

    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    /// Splits the job into tasks and queues them.
    ///
    /// Re-submitting a known job id creates nothing and returns that id.
    pub async fn submit_job(
        &self,
        source: SourceRef,
        target_languages: Vec<String>,
        job_id: Option<String>,
        priority: i32,
    ) -> Result<String> {
        validate_languages(&target_languages)?;

        let job_id = job_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("job-{}", Uuid::new_v4()));

        let mut state = self.state.write().await;
        if state.contains_job(&job_id) {
            warn!(job_id = %job_id, "job already submitted, ignoring");
            return Ok(job_id);
        }

        let job = Job {
            id: job_id.clone(),
            source,
            target_languages,
            priority,
            created_at: Utc::now(),
            task_ids: Vec::new(),
        };
        let tasks = state.submit(job, self.config.max_languages_per_task);

        info!(job_id = %job_id, tasks, priority, "job submitted");
        Ok(job_id)
    }

    /// One pass of the assignment loop. Returns how many tasks were handed out.
    pub async fn assign_pending(&self) -> usize {
        assign_pending(&self.state, &self.workers, self.config.enable_load_balancing).await
    }

    /// One pass of the timeout sweep. Returns the ids of the tasks it failed.
    pub async fn sweep_timeouts(&self) -> Vec<String> {
        sweep_timeouts(&self.state, self.config.task_timeout).await
    }

    pub async fn get_job_status(&self, job_id: &str) -> JobStatus {
        self.state.read().await.job_status(job_id)
    }

    pub async fn job(&self, job_id: &str) -> Option<Job> {
        self.state.read().await.job(job_id).cloned()
    }

    pub async fn task(&self, task_id: &str) -> Option<Task> {
        self.state.read().await.task(task_id)
    }

    /// Polls until every task of the job is terminal.
    ///
    /// An unknown job has no tasks and resolves at once with an empty report.
    pub async fn wait_for_job_completion(&self, job_id: &str) -> JobReport {
        loop {
            {
                let state = self.state.read().await;
                if state.job_status(job_id).is_complete {
                    return state.job_report(job_id);
                }
            }
            sleep(self.config.completion_poll_interval).await;
        }
    }

    pub async fn wait_for_job_completion_timeout(&self, job_id: &str, limit: Duration) -> Result<JobReport> {
        timeout(limit, self.wait_for_job_completion(job_id))
            .await
            .map_err(|_| DispatchError::WaitTimeout(job_id.to_string()))
    }

    pub async fn worker_loads(&self) -> Vec<WorkerLoad> {
        let mut loads = Vec::with_capacity(self.workers.len());
        for worker in &self.workers {
            loads.push(worker.load().await);
        }
        loads
    }

    pub async fn get_statistics(&self) -> CoordinatorStats {
        let mut stats = self.state.read().await.stats();
        stats.workers = self.worker_loads().await;
        stats
    }

    /// Drops queued work, then lets every worker drain what it already holds.
    pub async fn shutdown(&self) {
        // Loops finish their current pass before exiting
        self.stop_loops.send_replace(true);
        let loops: Vec<_> = self.loops.lock().await.drain(..).collect();
        for result in join_all(loops).await {
            if let Err(e) = result {
                warn!("control loop ended abnormally: {}", e);
            }
        }

        let dropped = self.state.write().await.clear_pending();
        info!(dropped, "pending queue cleared");

        join_all(self.workers.iter().map(|w| w.stop())).await;
        info!("coordinator shut down");
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        for handle in self.loops.get_mut().drain(..) {
            handle.abort();
        }
        for worker in &self.workers {
            worker.abort();
        }
    }
}

/// Runs `tick` every `period`, starting one period from now, until `stop` flips.
fn spawn_periodic<F, Fut>(period: Duration, mut stop: watch::Receiver<bool>, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => tick().await,
            }
            if *stop.borrow() {
                break;
            }
        }
    })
}

/// Hands at most one queued task to each available worker.
async fn assign_pending(
    state: &RwLock<CoordinatorState>,
    workers: &[Arc<Worker>],
    balance: bool,
) -> usize {
    let mut state = state.write().await;
    if !state.has_pending() {
        return 0;
    }

    let mut available = Vec::new();
    for worker in workers {
        if worker.is_available().await {
            available.push((worker.assigned_count().await, worker));
        }
    }

    // Equal loads go to the lowest worker id
    if balance {
        available.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id().cmp(b.1.id())));
    }

    let now = Utc::now();
    let mut assigned = 0;
    for (_, worker) in available {
        let Some(task) = state.activate_next(worker.id(), now) else {
            break;
        };
        worker.assign_task(task).await;
        assigned += 1;
    }

    if assigned > 0 {
        debug!(assigned, "assignment pass");
    }
    assigned
}

async fn sweep_timeouts(state: &RwLock<CoordinatorState>, task_timeout: Duration) -> Vec<String> {
    let expired = state.write().await.expire_stalled(Utc::now(), task_timeout);
    for task_id in &expired {
        warn!(task_id = %task_id, timeout_secs = task_timeout.as_secs(), "task timed out");
    }
    expired
}
