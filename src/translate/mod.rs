//! The translation capability consumed by workers.

use crate::common::config::TranslatorSection;
use crate::common::types::{ArtifactRef, SourceRef};
use crate::store::ArtifactStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// This one language could not be translated. The rest of the task goes on.
    #[error("translation rejected: {0}")]
    Rejected(String),

    /// The backend itself is unusable. Fails the whole task.
    #[error("translator unavailable: {0}")]
    Unavailable(String),
}

/// Turns a source document into a translated artifact for one language.
///
/// Retries and backoff, if any, are the implementor's concern.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        source: &SourceRef,
        language: &str,
    ) -> Result<ArtifactRef, TranslateError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateRequest<'a> {
    content: serde_json::Value,
    languages: [&'a str; 1],
    source_language: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    results: HashMap<String, LanguageResponse>,
}

#[derive(Deserialize)]
struct LanguageResponse {
    success: bool,
    #[serde(default)]
    content: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Calls a remote `/translate` endpoint and keeps results in the artifact store.
pub struct HttpTranslator {
    client: reqwest::Client,
    endpoint: String,
    source_language: String,
    store: Arc<ArtifactStore>,
}

impl HttpTranslator {
    pub fn new(config: &TranslatorSection, store: Arc<ArtifactStore>) -> Result<Self, TranslateError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| TranslateError::Unavailable(e.to_string()))?;

        Ok(HttpTranslator {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            source_language: config.source_language.clone(),
            store,
        })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(
        &self,
        source: &SourceRef,
        language: &str,
    ) -> Result<ArtifactRef, TranslateError> {
        let content = self
            .store
            .get_json(&source.0)
            .map_err(|e| TranslateError::Unavailable(format!("source {}: {}", source, e)))?;

        let request = TranslateRequest {
            content,
            languages: [language],
            source_language: &self.source_language,
        };

        let response = self
            .client
            .post(format!("{}/translate", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| TranslateError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TranslateError::Unavailable(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let mut body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| TranslateError::Unavailable(format!("bad response body: {}", e)))?;

        let entry = body.results.remove(language).ok_or_else(|| {
            TranslateError::Rejected(format!("no result returned for {}", language))
        })?;

        match (entry.success, entry.content) {
            (true, Some(content)) => {
                let hash = self
                    .store
                    .put_json(&content)
                    .map_err(|e| TranslateError::Unavailable(e.to_string()))?;
                Ok(ArtifactRef(hash))
            }
            (true, None) => Err(TranslateError::Rejected("empty translation".to_string())),
            (false, _) => Err(TranslateError::Rejected(
                entry.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}
