use crate::common::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "arb-dispatch.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub coordinator: CoordinatorSection,
    pub worker: WorkerSection,
    pub store: StoreSection,
    pub translator: TranslatorSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSection {
    pub max_workers: usize,
    pub max_languages_per_task: usize,
    pub task_timeout_secs: u64,
    pub assignment_interval_ms: u64,
    pub timeout_sweep_interval_ms: u64,
    pub completion_poll_interval_ms: u64,
    pub enable_load_balancing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    pub capacity: usize,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorSection {
    pub endpoint: String,
    pub source_language: String,
    pub request_timeout_secs: u64,
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        CoordinatorSection {
            max_workers: 3,
            max_languages_per_task: 5,
            task_timeout_secs: 600,
            assignment_interval_ms: 2_000,
            timeout_sweep_interval_ms: 60_000,
            completion_poll_interval_ms: 1_000,
            enable_load_balancing: true,
        }
    }
}

impl Default for WorkerSection {
    fn default() -> Self {
        WorkerSection {
            capacity: 3,
            poll_interval_ms: 1_000,
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        StoreSection {
            root: "./arb-store".to_string(),
        }
    }
}

impl Default for TranslatorSection {
    fn default() -> Self {
        TranslatorSection {
            endpoint: "http://127.0.0.1:8080".to_string(),
            source_language: "en".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default locations
    pub fn load_default() -> Result<Self> {
        let candidates = std::iter::once(PathBuf::from(CONFIG_FILE_NAME)).chain(Self::user_config_path());
        Self::load_first(candidates)
    }

    /// Loads the first candidate that exists, or the defaults when none do.
    pub fn load_first<I: IntoIterator<Item = PathBuf>>(candidates: I) -> Result<Self> {
        match candidates.into_iter().find(|path| path.exists()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// `<config_dir>/arb-dispatch/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("arb-dispatch").join("config.toml"))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.coordinator;
        let checks = [
            (c.max_workers == 0, "coordinator.max_workers must be at least 1"),
            (c.max_languages_per_task == 0, "coordinator.max_languages_per_task must be at least 1"),
            (c.task_timeout_secs == 0, "coordinator.task_timeout_secs must be positive"),
            (c.assignment_interval_ms == 0, "coordinator.assignment_interval_ms must be positive"),
            (c.timeout_sweep_interval_ms == 0, "coordinator.timeout_sweep_interval_ms must be positive"),
            (c.completion_poll_interval_ms == 0, "coordinator.completion_poll_interval_ms must be positive"),
            (self.worker.capacity == 0, "worker.capacity must be at least 1"),
            (self.worker.poll_interval_ms == 0, "worker.poll_interval_ms must be positive"),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(DispatchError::InvalidConfig(message.to_string())),
            None => Ok(()),
        }
    }
}

/// Runtime knobs of the coordinator and its worker pool.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub max_workers: usize,
    pub worker_capacity: usize,
    pub max_languages_per_task: usize,
    pub task_timeout: Duration,
    pub enable_load_balancing: bool,
    pub assignment_interval: Duration,
    pub timeout_sweep_interval: Duration,
    pub completion_poll_interval: Duration,
    pub worker_poll_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig::from(&Config::default())
    }
}

impl From<&Config> for CoordinatorConfig {
    fn from(config: &Config) -> Self {
        let c = &config.coordinator;
        CoordinatorConfig {
            max_workers: c.max_workers,
            worker_capacity: config.worker.capacity,
            max_languages_per_task: c.max_languages_per_task,
            task_timeout: Duration::from_secs(c.task_timeout_secs),
            enable_load_balancing: c.enable_load_balancing,
            assignment_interval: Duration::from_millis(c.assignment_interval_ms),
            timeout_sweep_interval: Duration::from_millis(c.timeout_sweep_interval_ms),
            completion_poll_interval: Duration::from_millis(c.completion_poll_interval_ms),
            worker_poll_interval: Duration::from_millis(config.worker.poll_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.worker_capacity, 3);
        assert_eq!(config.max_languages_per_task, 5);
        assert_eq!(config.task_timeout, Duration::from_secs(600));
        assert_eq!(config.assignment_interval, Duration::from_secs(2));
        assert_eq!(config.timeout_sweep_interval, Duration::from_secs(60));
        assert!(config.enable_load_balancing);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = Config::default();
        config.coordinator.max_workers = 7;
        config.translator.endpoint = "http://translate.internal:9000".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.coordinator.max_workers, 7);
        assert_eq!(loaded.translator.endpoint, "http://translate.internal:9000");
        assert_eq!(loaded.worker.capacity, 3);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[worker]\ncapacity = 1\n").unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.worker.capacity, 1);
        assert_eq!(loaded.coordinator.max_languages_per_task, 5);
    }

    #[test]
    fn test_lookup_order() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join(CONFIG_FILE_NAME);
        let user = temp_dir.path().join("user").join("config.toml");

        let loaded = Config::load_first(vec![local.clone(), user.clone()]).unwrap();
        assert_eq!(loaded.coordinator.max_workers, 3);

        let mut config = Config::default();
        config.coordinator.max_workers = 9;
        config.save(&user).unwrap();
        let loaded = Config::load_first(vec![local.clone(), user.clone()]).unwrap();
        assert_eq!(loaded.coordinator.max_workers, 9);

        config.coordinator.max_workers = 4;
        config.save(&local).unwrap();
        let loaded = Config::load_first(vec![local, user]).unwrap();
        assert_eq!(loaded.coordinator.max_workers, 4);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[worker]\ncapacity = 0\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidConfig(_)));
    }
}
