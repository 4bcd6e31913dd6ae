use crate::common::types::{LanguageOutcome, SourceRef, Task, TaskResult, WorkerLoad};
use crate::coordinator::CompletionSink;
use crate::translate::{TranslateError, Translator};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerPhase {
    Stopped,
    Running,
    Stopping,
}

struct WorkerState {
    phase: WorkerPhase,
    inbox: VecDeque<Task>,
    executing: Option<String>,
}

impl WorkerState {
    fn load(&self) -> usize {
        self.inbox.len() + usize::from(self.executing.is_some())
    }
}

/// Executes assigned tasks one at a time against the translator.
///
/// Up to `capacity` tasks may be assigned at once; they wait in the inbox
/// until the poll loop picks them up.
pub struct Worker {
    id: String,
    capacity: usize,
    poll_interval: Duration,
    translator: Arc<dyn Translator>,
    sink: CompletionSink,
    state: RwLock<WorkerState>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub fn new(
        id: String,
        capacity: usize,
        poll_interval: Duration,
        translator: Arc<dyn Translator>,
        sink: CompletionSink,
    ) -> Self {
        Worker {
            id,
            capacity,
            poll_interval,
            translator,
            sink,
            state: RwLock::new(WorkerState {
                phase: WorkerPhase::Stopped,
                inbox: VecDeque::new(),
                executing: None,
            }),
            handle: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn phase(&self) -> WorkerPhase {
        self.state.read().await.phase
    }

    /// Tasks assigned and not yet finished, including the one executing.
    pub async fn assigned_count(&self) -> usize {
        self.state.read().await.load()
    }

    pub async fn is_available(&self) -> bool {
        let state = self.state.read().await;
        state.phase == WorkerPhase::Running && state.load() < self.capacity
    }

    pub async fn load(&self) -> WorkerLoad {
        let state = self.state.read().await;
        WorkerLoad {
            worker_id: self.id.clone(),
            assigned: state.load(),
            capacity: self.capacity,
            running: state.phase == WorkerPhase::Running,
        }
    }

    /// Queues a task. The caller has already checked for headroom.
    pub async fn assign_task(&self, task: Task) {
        let mut state = self.state.write().await;
        debug!(worker_id = %self.id, task_id = %task.id, "task assigned");
        state.inbox.push_back(task);
    }

    /// Spawns the poll loop. Calling it on a running worker does nothing.
    pub async fn start(self: &Arc<Self>) {
        {
            let mut state = self.state.write().await;
            if state.phase != WorkerPhase::Stopped {
                return;
            }
            state.phase = WorkerPhase::Running;
        }

        let worker = Arc::clone(self);
        let handle = tokio::spawn(async move { worker.poll_loop().await });
        *self.handle.lock().await = Some(handle);
        info!(worker_id = %self.id, capacity = self.capacity, "worker started");
    }

    /// Stops taking new work and waits for every assigned task to finish.
    pub async fn stop(&self) {
        {
            let mut state = self.state.write().await;
            if state.phase == WorkerPhase::Running {
                state.phase = WorkerPhase::Stopping;
            }
        }

        while self.assigned_count().await > 0 {
            sleep(self.poll_interval).await;
        }

        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                error!(worker_id = %self.id, "worker loop ended abnormally: {}", e);
            }
        }

        self.state.write().await.phase = WorkerPhase::Stopped;
        info!(worker_id = %self.id, "worker stopped");
    }

    /// Kills the poll loop without draining. Tasks it held stay unreported.
    pub fn abort(&self) {
        if let Ok(mut handle) = self.handle.try_lock() {
            if let Some(handle) = handle.take() {
                handle.abort();
            }
        }
    }

    async fn poll_loop(&self) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let task = {
                let mut state = self.state.write().await;
                match state.inbox.pop_front() {
                    Some(task) => {
                        state.executing = Some(task.id.clone());
                        task
                    }
                    None if state.phase == WorkerPhase::Running => continue,
                    None => {
                        state.phase = WorkerPhase::Stopped;
                        break;
                    }
                }
            };

            self.execute(task).await;
            self.state.write().await.executing = None;
        }
    }

    async fn execute(&self, task: Task) {
        debug!(worker_id = %self.id, task_id = %task.id, languages = ?task.language_chunk, "executing task");

        // Run on its own tokio task so a panicking translator is caught here
        let translator = Arc::clone(&self.translator);
        let source = task.source.clone();
        let languages = task.language_chunk.clone();
        let outcome = tokio::spawn(async move {
            translate_chunk(translator.as_ref(), &source, &languages).await
        })
        .await;

        match outcome {
            Ok(Ok(result)) => self.sink.task_completed(&task.id, result).await,
            Ok(Err(e)) => self.sink.task_failed(&task.id, e.to_string()).await,
            Err(e) => {
                warn!(worker_id = %self.id, task_id = %task.id, "task execution aborted: {}", e);
                self.sink
                    .task_failed(&task.id, format!("task execution aborted: {}", e))
                    .await
            }
        }
    }
}

/// Translates each language in turn.
///
/// A rejected language is recorded and the loop moves on; an unavailable
/// translator aborts the whole chunk.
pub async fn translate_chunk(
    translator: &dyn Translator,
    source: &SourceRef,
    languages: &[String],
) -> Result<TaskResult, TranslateError> {
    let mut result = TaskResult::default();

    for language in languages {
        let outcome = match translator.translate(source, language).await {
            Ok(artifact) => LanguageOutcome::Translated { artifact },
            Err(TranslateError::Rejected(error)) => LanguageOutcome::Failed { error },
            Err(e @ TranslateError::Unavailable(_)) => return Err(e),
        };
        result.insert(language.clone(), outcome);
    }

    Ok(result)
}
