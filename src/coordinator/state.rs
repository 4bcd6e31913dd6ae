//! Task bookkeeping owned by the coordinator.
//!
//! Every task lives in exactly one of the four partitions: the pending queue,
//! `active`, `completed` or `failed`. All moves between partitions go through
//! the methods here.

use crate::common::error::{DispatchError, Result};
use crate::common::types::{
    average_duration, ratio, CoordinatorStats, Job, JobReport, JobStatus, Task, TaskResult,
    TaskStatus,
};
use crate::coordinator::queue::TaskQueue;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

pub const TIMEOUT_ERROR: &str = "task timeout";

#[derive(Default)]
pub struct CoordinatorState {
    jobs: HashMap<String, Job>,
    pending: TaskQueue,
    active: HashMap<String, Task>,
    completed: HashMap<String, Task>,
    failed: HashMap<String, Task>,
}

/// Rejects empty lists, malformed codes and duplicates.
pub fn validate_languages(languages: &[String]) -> Result<()> {
    if languages.is_empty() {
        return Err(DispatchError::EmptyLanguages);
    }

    let mut seen = HashSet::new();
    for code in languages {
        let well_formed = !code.is_empty()
            && code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !well_formed {
            return Err(DispatchError::InvalidLanguage(code.clone()));
        }
        if !seen.insert(code.as_str()) {
            return Err(DispatchError::DuplicateLanguage(code.clone()));
        }
    }

    Ok(())
}

/// Splits a job's languages into contiguous chunks of at most `chunk_size`.
pub fn split_into_tasks(job: &Job, chunk_size: usize) -> Vec<Task> {
    job.target_languages
        .chunks(chunk_size.max(1))
        .enumerate()
        .map(|(index, chunk)| Task::new(job, index, chunk.to_vec()))
        .collect()
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_job(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    /// Registers the job and queues its tasks. Returns the number of tasks.
    pub fn submit(&mut self, mut job: Job, chunk_size: usize) -> usize {
        let tasks = split_into_tasks(&job, chunk_size);
        job.task_ids = tasks.iter().map(|t| t.id.clone()).collect();

        let count = tasks.len();
        for task in tasks {
            self.pending.push(task);
        }
        self.jobs.insert(job.id.clone(), job);
        count
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Dequeues the next pending task and moves it to `active`.
    ///
    /// Returns the copy that is handed to the worker.
    pub fn activate_next(&mut self, worker_id: &str, now: DateTime<Utc>) -> Option<Task> {
        let mut task = self.pending.pop()?;
        task.status = TaskStatus::Active;
        task.started_at = Some(now);
        task.assigned_worker = Some(worker_id.to_string());

        self.active.insert(task.id.clone(), task.clone());
        Some(task)
    }

    /// Moves an active task to `completed`. Tasks no longer active are ignored.
    pub fn complete(&mut self, task_id: &str, result: TaskResult, now: DateTime<Utc>) -> bool {
        let Some(mut task) = self.active.remove(task_id) else {
            return false;
        };
        task.status = TaskStatus::Completed;
        task.completed_at = Some(now);
        task.result = Some(result);
        self.completed.insert(task.id.clone(), task);
        true
    }

    /// Moves an active task to `failed`. Tasks no longer active are ignored.
    pub fn fail(&mut self, task_id: &str, error: impl Into<String>, now: DateTime<Utc>) -> bool {
        let Some(mut task) = self.active.remove(task_id) else {
            return false;
        };
        task.status = TaskStatus::Failed;
        task.completed_at = Some(now);
        task.error = Some(error.into());
        self.failed.insert(task.id.clone(), task);
        true
    }

    /// Fails every active task started more than `timeout` before `now`.
    pub fn expire_stalled(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<String> {
        let timeout = match chrono::Duration::from_std(timeout) {
            Ok(timeout) => timeout,
            Err(_) => return Vec::new(),
        };

        let expired: Vec<String> = self
            .active
            .values()
            .filter(|task| task.started_at.is_some_and(|start| now - start > timeout))
            .map(|task| task.id.clone())
            .collect();

        for task_id in &expired {
            self.fail(task_id, TIMEOUT_ERROR, now);
        }
        expired
    }

    /// Discards all queued tasks. Active and terminal tasks are untouched.
    pub fn clear_pending(&mut self) -> usize {
        self.pending.clear()
    }

    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.active
            .get(task_id)
            .or_else(|| self.completed.get(task_id))
            .or_else(|| self.failed.get(task_id))
            .or_else(|| self.pending.iter().find(|t| t.id == task_id))
            .cloned()
    }

    pub fn job(&self, job_id: &str) -> Option<&Job> {
        self.jobs.get(job_id)
    }

    /// Counts for one job. An unknown job yields all zeros.
    pub fn job_status(&self, job_id: &str) -> JobStatus {
        let of_job = |task: &&Task| task.job_id == job_id;

        let pending_tasks = self.pending.iter().filter(of_job).count();
        let active_tasks = self.active.values().filter(of_job).count();
        let completed_tasks = self.completed.values().filter(of_job).count();
        let failed_tasks = self.failed.values().filter(of_job).count();
        let total_tasks = pending_tasks + active_tasks + completed_tasks + failed_tasks;

        JobStatus {
            job_id: job_id.to_string(),
            total_tasks,
            completed_tasks,
            failed_tasks,
            active_tasks,
            pending_tasks,
            completion_rate: ratio(completed_tasks, total_tasks),
            is_complete: completed_tasks + failed_tasks == total_tasks,
        }
    }

    pub fn job_report(&self, job_id: &str) -> JobReport {
        let status = self.job_status(job_id);

        let completed: Vec<&Task> = self
            .completed
            .values()
            .filter(|t| t.job_id == job_id)
            .collect();
        let failed: Vec<&Task> = self.failed.values().filter(|t| t.job_id == job_id).collect();

        let results: BTreeMap<String, TaskResult> = completed
            .iter()
            .map(|t| (t.id.clone(), t.result.clone().unwrap_or_default()))
            .collect();
        let errors: BTreeMap<String, String> = failed
            .iter()
            .map(|t| (t.id.clone(), t.error.clone().unwrap_or_default()))
            .collect();

        // Walk tasks in submission order so the list follows the job's language order
        let mut failed_languages = Vec::new();
        if let Some(job) = self.jobs.get(job_id) {
            for task_id in &job.task_ids {
                if let Some(result) = results.get(task_id) {
                    failed_languages.extend(result.failed_languages().map(str::to_string));
                } else if let Some(task) = self.failed.get(task_id) {
                    failed_languages.extend(task.language_chunk.iter().cloned());
                }
            }
        }

        JobReport {
            job_id: job_id.to_string(),
            total_tasks: status.total_tasks,
            completed_tasks: status.completed_tasks,
            failed_tasks: status.failed_tasks,
            completion_rate: status.completion_rate,
            results,
            errors,
            failed_languages,
            average_task_time: average_duration(completed.into_iter()),
        }
    }

    /// Coordinator-wide counters. Worker loads are filled in by the caller.
    pub fn stats(&self) -> CoordinatorStats {
        let pending_tasks = self.pending.len();
        let active_tasks = self.active.len();
        let completed_tasks = self.completed.len();
        let failed_tasks = self.failed.len();
        let total_tasks = pending_tasks + active_tasks + completed_tasks + failed_tasks;

        CoordinatorStats {
            total_tasks,
            pending_tasks,
            active_tasks,
            completed_tasks,
            failed_tasks,
            completion_rate: ratio(completed_tasks, total_tasks),
            average_task_time: average_duration(self.completed.values()),
            workers: Vec::new(),
        }
    }
}
