use thiserror::Error;

pub type Result<T> = std::result::Result<T, SkillmapError>;

#[derive(Error, Debug)]
pub enum SkillmapError {
    #[error("Git command failed in {repo}: {stderr}")]
    GitCommand { repo: String, stderr: String },
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Invalid commit id: {0}")]
    InvalidSha(String),
    #[error("Job queue already started; submissions are closed")]
    QueueStarted,
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SkillmapError {
    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }
}
