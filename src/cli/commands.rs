use crate::arb;
use crate::common::types::{JobReport, LanguageOutcome};
use crate::common::{Config, CoordinatorConfig};
use crate::coordinator::Coordinator;
use crate::store::ArtifactStore;
use crate::translate::HttpTranslator;
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub struct CommandExecutor {
    config: Config,
}

impl CommandExecutor {
    pub fn new(config: Config) -> Self {
        CommandExecutor { config }
    }

    fn read_document(path: &Path) -> Result<serde_json::Value> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("{} is not valid JSON", path.display()))
    }

    pub async fn translate(
        &self,
        file: &Path,
        languages: Vec<String>,
        job_id: Option<String>,
        priority: i32,
        timeout_secs: Option<u64>,
        json: bool,
    ) -> Result<()> {
        let document = Self::read_document(file)?;
        let validation = arb::validate(&document);
        if !validation.valid {
            anyhow::bail!("{} is not a valid ARB file: {}", file.display(), validation.issues.join("; "));
        }

        let store = Arc::new(
            ArtifactStore::new(&self.config.store.root).context("Failed to open artifact store")?,
        );
        let source = crate::common::types::SourceRef(store.put_json(&document)?);
        let translator = HttpTranslator::new(&self.config.translator, Arc::clone(&store))
            .context("Failed to build translator client")?;

        let coordinator =
            Coordinator::initialize(CoordinatorConfig::from(&self.config), Arc::new(translator)).await?;
        let job_id = coordinator
            .submit_job(source, languages, job_id, priority)
            .await?;

        if !json {
            println!("{}", "✅ Job submitted".green());
            println!("   Job ID: {}", job_id.bright_yellow());
            println!("   File: {}", file.display());
        }

        let report = match timeout_secs {
            Some(secs) => {
                // On expiry the coordinator is dropped, which aborts the workers
                // instead of draining them
                coordinator
                    .wait_for_job_completion_timeout(&job_id, Duration::from_secs(secs))
                    .await?
            }
            None => coordinator.wait_for_job_completion(&job_id).await,
        };
        coordinator.shutdown().await;

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            Self::print_report(&report, &store);
        }

        Ok(())
    }

    fn print_report(report: &JobReport, store: &ArtifactStore) {
        println!("{}", "📊 Job Report".bold());
        println!(
            "   Tasks: {} total, {} completed, {} failed",
            report.total_tasks,
            report.completed_tasks.to_string().green(),
            report.failed_tasks.to_string().red()
        );
        println!("   Completion: {:.0}%", report.completion_rate * 100.0);
        println!("   Avg task time: {} ms", report.average_task_time.as_millis());

        for result in report.results.values() {
            for (language, outcome) in &result.0 {
                match outcome {
                    LanguageOutcome::Translated { artifact } => {
                        let location = store
                            .path_for(&artifact.0)
                            .map(|p| p.display().to_string())
                            .unwrap_or_else(|_| artifact.0.clone());
                        println!("  {} {} → {}", "✓".green(), language.bright_cyan(), location);
                    }
                    LanguageOutcome::Failed { error } => {
                        println!("  {} {}: {}", "✗".red(), language.bright_cyan(), error);
                    }
                }
            }
        }

        for (task_id, error) in &report.errors {
            println!("  {} task {}: {}", "✗".red(), task_id, error.red());
        }

        if !report.failed_languages.is_empty() {
            println!(
                "{} {}",
                "⚠️  Failed languages:".yellow(),
                report.failed_languages.join(", ")
            );
        }
    }

    pub fn validate(&self, file: &Path) -> Result<()> {
        let document = Self::read_document(file)?;
        let report = arb::validate(&document);

        if report.valid {
            println!("{} {} ({} keys)", "✓".green(), file.display(), report.key_count);
        } else {
            println!("{} {} ({} keys)", "✗".red(), file.display(), report.key_count);
            for issue in &report.issues {
                println!("   - {}", issue);
            }
            anyhow::bail!("{} issue(s) found", report.issues.len());
        }

        Ok(())
    }

    pub fn config_init(&self, path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        Config::default()
            .save(path)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("{} Wrote default config to {}", "✅".green(), path.display());
        Ok(())
    }

    pub fn config_show(&self) -> Result<()> {
        print!("{}", toml::to_string_pretty(&self.config)?);
        Ok(())
    }
}
