use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Job has no target languages")]
    EmptyLanguages,

    #[error("Invalid language code: {0:?}")]
    InvalidLanguage(String),

    #[error("Duplicate language code: {0}")]
    DuplicateLanguage(String),

    #[error("Artifact store error: {0}")]
    Store(String),

    #[error("Timed out waiting for job {0}")]
    WaitTimeout(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
