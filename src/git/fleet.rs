use super::RepoScanner;
use crate::error::Result;
use crate::model::Repository;
use crate::queue::JobQueue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Direct subdirectories of `root` that hold a `.git` entry, sorted by path.
/// Plain folders next to the repositories are skipped.
pub fn discover_repositories<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root.as_ref())? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let dir = entry.path();
        if dir.join(".git").exists() {
            dirs.push(dir);
        } else {
            debug!(dir = %dir.display(), "skipping directory without .git");
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Runs one [`RepoScanner`] per repository on its own [`JobQueue`], so
/// repositories and commits within a repository have separate budgets.
pub struct FleetScanner {
    scanner: Arc<RepoScanner>,
    parallelism: usize,
}

impl FleetScanner {
    pub fn new(scanner: RepoScanner) -> Self {
        let parallelism = scanner.config().repo_parallelism;
        Self {
            scanner: Arc::new(scanner),
            parallelism,
        }
    }

    pub async fn scan<P: AsRef<Path>>(&self, root: P) -> Result<Vec<Repository>> {
        let dirs = discover_repositories(root)?;
        self.scan_dirs(dirs).await
    }

    /// Scans `dirs` and returns the repositories in submission order.
    pub async fn scan_dirs(&self, dirs: Vec<PathBuf>) -> Result<Vec<Repository>> {
        let total = dirs.len();
        let mut queue = JobQueue::new(self.parallelism)?;
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, Result<Repository>)>();

        for (index, dir) in dirs.into_iter().enumerate() {
            let scanner = Arc::clone(&self.scanner);
            let tx = tx.clone();
            queue.add_operation(move |done| {
                tokio::spawn(async move {
                    let scanned = scanner.scan(&dir).await;
                    let _ = tx.send((index, scanned));
                    done.done();
                });
            })?;
        }
        drop(tx);

        queue.start().await?;

        let mut results = Vec::with_capacity(total);
        while let Ok(entry) = rx.try_recv() {
            results.push(entry);
        }
        results.sort_by_key(|(index, _)| *index);

        let repos = results
            .into_iter()
            .map(|(_, scanned)| scanned)
            .collect::<Result<Vec<_>>>()?;
        info!(repositories = repos.len(), "fleet scan finished");
        Ok(repos)
    }
}
