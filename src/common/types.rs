use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Opaque handle to the document being translated (an artifact store hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(pub String);

/// Opaque handle to a translated document produced by the translator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(pub String);

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A translation request as submitted. Its task set is fixed at submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub source: SourceRef,
    pub target_languages: Vec<String>,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub task_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::Active => write!(f, "ACTIVE"),
            TaskStatus::Completed => write!(f, "COMPLETED"),
            TaskStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Outcome of translating the source into one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LanguageOutcome {
    Translated { artifact: ArtifactRef },
    Failed { error: String },
}

impl LanguageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LanguageOutcome::Translated { .. })
    }
}

/// Per-language outcomes of one executed task, keyed by language code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskResult(pub BTreeMap<String, LanguageOutcome>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total_languages: usize,
    pub successful: usize,
    pub failed: usize,
}

impl TaskResult {
    pub fn insert(&mut self, language: impl Into<String>, outcome: LanguageOutcome) {
        self.0.insert(language.into(), outcome);
    }

    pub fn get(&self, language: &str) -> Option<&LanguageOutcome> {
        self.0.get(language)
    }

    pub fn failed_languages(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(language, _)| language.as_str())
    }

    pub fn summary(&self) -> ResultSummary {
        let successful = self.0.values().filter(|o| o.is_success()).count();
        ResultSummary {
            total_languages: self.0.len(),
            successful,
            failed: self.0.len() - successful,
        }
    }
}

/// Unit of scheduled work: a contiguous chunk of one job's target languages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub job_id: String,
    pub source: SourceRef,
    pub language_chunk: Vec<String>,
    pub priority: i32,
    pub created_at: DateTime<Utc>,

    pub status: TaskStatus,
    pub assigned_worker: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
}

impl Task {
    pub fn new(job: &Job, index: usize, language_chunk: Vec<String>) -> Self {
        Task {
            id: format!("{}-task-{}", job.id, index),
            job_id: job.id.clone(),
            source: job.source.clone(),
            language_chunk,
            priority: job.priority,
            created_at: job.created_at,
            status: TaskStatus::Pending,
            assigned_worker: None,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Wall time between start and completion, if both are stamped.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => (end - start).to_std().ok(),
            _ => None,
        }
    }
}

/// Per-job counters, computed by scanning every partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub active_tasks: usize,
    pub pending_tasks: usize,
    pub completion_rate: f64,
    pub is_complete: bool,
}

/// Aggregate returned once every task of a job is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub completion_rate: f64,
    pub results: BTreeMap<String, TaskResult>,
    pub errors: BTreeMap<String, String>,
    pub failed_languages: Vec<String>,
    #[serde(with = "duration_millis")]
    pub average_task_time: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerLoad {
    pub worker_id: String,
    pub assigned: usize,
    pub capacity: usize,
    pub running: bool,
}

/// Coordinator-wide counters, not scoped to a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorStats {
    pub total_tasks: usize,
    pub pending_tasks: usize,
    pub active_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub completion_rate: f64,
    #[serde(with = "duration_millis")]
    pub average_task_time: Duration,
    pub workers: Vec<WorkerLoad>,
}

/// Mean duration of the given completed tasks, zero when there are none.
pub fn average_duration<'a>(tasks: impl Iterator<Item = &'a Task>) -> Duration {
    let (sum, count) = tasks
        .filter_map(Task::duration)
        .fold((Duration::ZERO, 0u32), |(sum, n), d| (sum + d, n + 1));
    if count == 0 {
        Duration::ZERO
    } else {
        sum / count
    }
}

pub fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
