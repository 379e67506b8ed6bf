use crate::cache::{JsonFileStore, SnapshotCache, SnapshotKey, SnapshotStore, SqliteStore};
use crate::classify::{Classifier, ExtensionTable};
use crate::cli::CommonArgs;
use crate::flat::{flatten_all, FlatDiff, FlatDiffRecord};
use crate::git::{FleetScanner, GitCli, RepoScanner, ScanConfig};
use crate::model::Repository;
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub fn scan_config(common: &CommonArgs) -> anyhow::Result<ScanConfig> {
    let config = ScanConfig::new(common.author.clone())
        .with_commit_parallelism(common.commit_jobs)
        .with_repo_parallelism(common.repo_jobs)
        .with_git_binary(common.git.clone());
    config.validate().context("Invalid scan configuration")?;
    Ok(config)
}

pub fn load_classifier(common: &CommonArgs) -> anyhow::Result<Arc<ExtensionTable>> {
    let table = match &common.classifier {
        Some(path) => ExtensionTable::load(path)
            .with_context(|| format!("Failed to load classifier table {}", path.display()))?,
        None => ExtensionTable::builtin(),
    };
    Ok(Arc::new(table))
}

fn scan_root(common: &CommonArgs) -> anyhow::Result<PathBuf> {
    match &common.root {
        Some(root) => Ok(root.clone()),
        None => std::env::current_dir().context("Failed to resolve current directory"),
    }
}

/// Identifies what a snapshot was scanned from: author, the absolute
/// `--repo`/`--root` directory and the classifier overlay contents.
pub fn snapshot_key(common: &CommonArgs) -> anyhow::Result<SnapshotKey> {
    let scope = match &common.repo {
        Some(repo) => repo.clone(),
        None => scan_root(common)?,
    };
    let scope = std::fs::canonicalize(&scope).unwrap_or(scope);
    let mut key = SnapshotKey::new(common.author.clone(), scope.to_string_lossy());
    if let Some(path) = &common.classifier {
        let table = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read classifier table {}", path.display()))?;
        key = key.with_classifier(table);
    }
    Ok(key)
}

/// Scans `--repo` or every repository under `--root`, with commits sorted
/// chronologically afterwards.
pub async fn scan_repositories(
    common: &CommonArgs,
    classifier: Arc<dyn Classifier>,
    show_progress: bool,
) -> anyhow::Result<Vec<Repository>> {
    let config = scan_config(common)?;
    let vcs = Arc::new(GitCli::new(config.git_binary.clone()));
    let mut scanner = RepoScanner::new(vcs, classifier, config);

    let pb = show_progress.then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} {pos} commits")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Scanning");
        pb
    });
    if let Some(pb) = &pb {
        scanner = scanner.with_progress(pb.clone());
    }

    let mut repos = match &common.repo {
        Some(dir) => vec![scanner
            .scan(dir)
            .await
            .with_context(|| format!("Failed to scan repository {}", dir.display()))?],
        None => {
            let root = scan_root(common)?;
            FleetScanner::new(scanner)
                .scan(&root)
                .await
                .with_context(|| format!("Failed to scan repositories under {}", root.display()))?
        }
    };

    if let Some(pb) = pb {
        pb.finish_with_message("Scanned");
    }

    for repo in &mut repos {
        repo.sort_commits();
    }
    Ok(repos)
}

/// Flattened diffs for the configured repositories, served from the
/// snapshot cache when `--cache` is set.
pub async fn fetch_flat_diffs(
    common: &CommonArgs,
    classifier: Arc<ExtensionTable>,
    show_progress: bool,
) -> anyhow::Result<Vec<FlatDiff>> {
    let scan = || {
        let classifier: Arc<dyn Classifier> = classifier.clone();
        async move {
            let repos = scan_repositories(common, classifier, show_progress).await?;
            Ok::<_, anyhow::Error>(
                flatten_all(&repos, common.criteria)
                    .iter()
                    .map(FlatDiff::to_record)
                    .collect::<Vec<_>>(),
            )
        }
    };

    let records = match &common.cache {
        Some(path) if is_sqlite_path(path) => {
            let store = SqliteStore::open(path)
                .with_context(|| format!("Failed to open snapshot database {}", path.display()))?;
            cached(SnapshotCache::new(store, snapshot_key(common)?), common.refresh, scan).await?
        }
        Some(path) => {
            let store = JsonFileStore::new(path);
            cached(SnapshotCache::new(store, snapshot_key(common)?), common.refresh, scan).await?
        }
        None => scan().await?,
    };

    Ok(records
        .into_iter()
        .map(|mut record| {
            record.criteria = common.criteria;
            FlatDiff::from_record(&record, classifier.as_ref())
        })
        .collect())
}

async fn cached<S, F, Fut>(
    mut cache: SnapshotCache<S>,
    refresh: bool,
    scan: F,
) -> anyhow::Result<Vec<FlatDiffRecord>>
where
    S: SnapshotStore,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<Vec<FlatDiffRecord>>>,
{
    if refresh {
        cache.invalidate().context("Failed to invalidate snapshot cache")?;
    }
    cache.get_or_scan(scan).await
}

fn is_sqlite_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("db") | Some("sqlite") | Some("sqlite3")
    )
}
