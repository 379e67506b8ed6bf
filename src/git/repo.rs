use super::{ScanConfig, Vcs};
use crate::classify::Classifier;
use crate::error::{Result, SkillmapError};
use crate::model::{validate_sha, Commit, FileRef, Repository};
use crate::queue::JobQueue;
use indicatif::ProgressBar;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Scans one repository directory into a [`Repository`].
///
/// Each commit's stat query runs as one job on a [`JobQueue`] bounded by
/// `commit_parallelism`. Commits are appended in completion order.
pub struct RepoScanner {
    vcs: Arc<dyn Vcs>,
    classifier: Arc<dyn Classifier>,
    config: ScanConfig,
    progress: Option<ProgressBar>,
}

impl RepoScanner {
    pub fn new(vcs: Arc<dyn Vcs>, classifier: Arc<dyn Classifier>, config: ScanConfig) -> Self {
        Self {
            vcs,
            classifier,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub async fn scan(&self, dir: &Path) -> Result<Repository> {
        info!(repo = %dir.display(), "starting repository scan");

        let log = self.vcs.commit_log(dir, &self.config.author).await?;
        let shas = parse_commit_list(&log)?;
        debug!(repo = %dir.display(), commits = shas.len(), "commit list read");

        let mut queue = JobQueue::new(self.config.commit_parallelism)?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Result<Commit>>();

        for sha in shas {
            let vcs = Arc::clone(&self.vcs);
            let classifier = Arc::clone(&self.classifier);
            let progress = self.progress.clone();
            let tx = tx.clone();
            let dir = dir.to_path_buf();

            queue.add_operation(move |done| {
                tokio::spawn(async move {
                    let parsed = match vcs.commit_stat(&dir, &sha).await {
                        Ok(output) => Commit::parse(&sha, &output, classifier.as_ref()),
                        Err(e) => Err(e),
                    };
                    if let Ok(commit) = &parsed {
                        debug!(sha = %sha, files = commit.file_diffs.len(), "commit parsed");
                    }
                    if let Some(pb) = &progress {
                        pb.inc(1);
                    }
                    let _ = tx.send(parsed);
                    done.done();
                });
            })?;
        }
        drop(tx);

        queue.start().await?;

        // Every job sends before it signals, so the channel is complete here.
        let mut repo = Repository::new(FileRef::unclassified(dir.to_string_lossy()));
        while let Ok(parsed) = rx.try_recv() {
            repo.push_commit(parsed?);
        }

        info!(
            repo = %dir.display(),
            commits = repo.commits.len(),
            additions = repo.additions,
            deletions = repo.deletions,
            "finished repository scan"
        );
        Ok(repo)
    }
}

/// Parses `git log --format=%H` output. Anything that is not a full SHA
/// means the repository metadata is unreadable.
pub fn parse_commit_list(output: &str) -> Result<Vec<String>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            validate_sha(line)
                .map(|_| line.to_string())
                .map_err(|_| SkillmapError::Parse(format!("Unreadable commit list entry: '{line}'")))
        })
        .collect()
}
