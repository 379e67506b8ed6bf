use crate::error::{Result, SkillmapError};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// The two history queries the scanners need.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Newline-separated SHAs authored by `author`, merges excluded.
    async fn commit_log(&self, repo: &Path, author: &str) -> Result<String>;

    /// ISO-8601 commit date on the first line, numstat lines after it.
    async fn commit_stat(&self, repo: &Path, sha: &str) -> Result<String>;
}

/// Shells out to the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
}

impl GitCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    async fn run(&self, repo: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(["-c", "core.quotePath=false"])
            .arg("-C")
            .arg(repo)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(SkillmapError::GitCommand {
                repo: repo.display().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

/// stderr markers of `git log` on a repository whose branch has no commits.
/// Older git releases report the second form.
const UNBORN_BRANCH: &[&str] = &["does not have any commits yet", "bad default revision 'HEAD'"];

#[async_trait]
impl Vcs for GitCli {
    async fn commit_log(&self, repo: &Path, author: &str) -> Result<String> {
        match self
            .run(repo, &["log", "--author", author, "--format=%H", "--no-merges"])
            .await
        {
            Err(SkillmapError::GitCommand { stderr, .. }) if UNBORN_BRANCH.iter().any(|m| stderr.contains(m)) => {
                debug!(repo = %repo.display(), "repository has no commits yet");
                Ok(String::new())
            }
            other => other,
        }
    }

    async fn commit_stat(&self, repo: &Path, sha: &str) -> Result<String> {
        self.run(
            repo,
            &[
                "show",
                "-w",
                "--numstat",
                "--diff-filter=ADMR",
                "--date=iso-strict",
                "--format=%ad",
                sha,
            ],
        )
        .await
    }
}
