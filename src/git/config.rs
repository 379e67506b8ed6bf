use crate::error::{Result, SkillmapError};

pub const DEFAULT_PARALLELISM: usize = 2;

/// Settings shared by the repository and fleet scanners.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub author: String,
    pub commit_parallelism: usize,
    pub repo_parallelism: usize,
    pub git_binary: String,
}

impl ScanConfig {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            commit_parallelism: DEFAULT_PARALLELISM,
            repo_parallelism: DEFAULT_PARALLELISM,
            git_binary: "git".to_string(),
        }
    }

    pub fn with_commit_parallelism(mut self, parallelism: usize) -> Self {
        self.commit_parallelism = parallelism;
        self
    }

    pub fn with_repo_parallelism(mut self, parallelism: usize) -> Self {
        self.repo_parallelism = parallelism;
        self
    }

    pub fn with_git_binary(mut self, binary: impl Into<String>) -> Self {
        self.git_binary = binary.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.author.trim().is_empty() {
            return Err(SkillmapError::config("author must not be empty"));
        }
        if self.commit_parallelism == 0 || self.repo_parallelism == 0 {
            return Err(SkillmapError::config("parallelism must be at least 1"));
        }
        Ok(())
    }
}
