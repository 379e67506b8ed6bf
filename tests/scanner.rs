use async_trait::async_trait;
use pretty_assertions::assert_eq;
use skillmap::classify::ExtensionTable;
use skillmap::error::{Result, SkillmapError};
use skillmap::git::{discover_repositories, parse_commit_list, FleetScanner, GitCli, RepoScanner, ScanConfig, Vcs};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn sha(n: u32) -> String {
    format!("{n:040x}")
}

#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl Gauge {
    async fn hold(&self, delay_ms: u64) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// In-memory history keyed by repository path and commit id.
#[derive(Default)]
struct FakeVcs {
    logs: HashMap<PathBuf, (u64, String)>,
    stats: HashMap<String, (u64, String)>,
    repos: Gauge,
    commits: Gauge,
}

impl FakeVcs {
    fn with_log(mut self, repo: impl Into<PathBuf>, delay_ms: u64, shas: &[String]) -> Self {
        self.logs.insert(repo.into(), (delay_ms, shas.join("\n") + "\n"));
        self
    }

    fn with_stat(mut self, sha: &str, delay_ms: u64, output: &str) -> Self {
        self.stats.insert(sha.to_string(), (delay_ms, output.to_string()));
        self
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn commit_log(&self, repo: &Path, _author: &str) -> Result<String> {
        let (delay, log) = self.logs.get(repo).cloned().ok_or_else(|| SkillmapError::GitCommand {
            repo: repo.display().to_string(),
            stderr: "fatal: not a git repository".into(),
        })?;
        self.repos.hold(delay).await;
        Ok(log)
    }

    async fn commit_stat(&self, repo: &Path, sha: &str) -> Result<String> {
        let (delay, output) = self.stats.get(sha).cloned().ok_or_else(|| SkillmapError::GitCommand {
            repo: repo.display().to_string(),
            stderr: format!("fatal: bad object {sha}"),
        })?;
        self.commits.hold(delay).await;
        Ok(output)
    }
}

fn scanner(vcs: Arc<FakeVcs>, config: ScanConfig) -> RepoScanner {
    RepoScanner::new(vcs, Arc::new(ExtensionTable::builtin()), config)
}

#[tokio::test]
async fn repository_scan_collects_every_commit() {
    let shas: Vec<String> = (1..=4).map(sha).collect();
    let vcs = FakeVcs::default()
        .with_log("/work/racer", 0, &shas)
        .with_stat(&shas[0], 40, "2024-01-01T09:00:00Z\n3\t1\tsrc/ir.cpp\n")
        .with_stat(&shas[1], 30, "2024-01-02T09:00:00Z\n2\t2\tsrc/ir.cpp\n-\t-\tlogo.png\n")
        .with_stat(&shas[2], 20, "2024-01-03T09:00:00Z\n0\t0\tsrc/empty.cpp\n")
        .with_stat(&shas[3], 10, "2024-01-04T09:00:00Z\n5\t0\tweb/app.js\n1\t1\tREADME.md\n");

    let mut repo = scanner(Arc::new(vcs), ScanConfig::new("Your Name"))
        .scan(Path::new("/work/racer"))
        .await
        .unwrap();

    assert_eq!(repo.name(), "racer");
    assert_eq!(repo.commits.len(), 4);
    assert_eq!((repo.additions, repo.deletions), (11, 4));

    repo.sort_commits();
    let order: Vec<&str> = repo.commits.iter().map(|c| c.sha.as_str()).collect();
    assert_eq!(order, shas.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(repo.commits[1].file_diffs.len(), 1);
    assert!(repo.commits[2].file_diffs.is_empty());
}

#[tokio::test]
async fn commit_queries_respect_parallelism() {
    let shas: Vec<String> = (1..=6).map(sha).collect();
    let mut vcs = FakeVcs::default().with_log("/work/racer", 0, &shas);
    for s in &shas {
        vcs = vcs.with_stat(s, 15, "2024-01-01T09:00:00Z\n1\t1\tmain.rs\n");
    }
    let vcs = Arc::new(vcs);

    let config = ScanConfig::new("Your Name").with_commit_parallelism(3);
    let repo = scanner(vcs.clone(), config).scan(Path::new("/work/racer")).await.unwrap();

    assert_eq!(repo.commits.len(), 6);
    assert!(vcs.commits.max() <= 3, "saw {} concurrent queries", vcs.commits.max());
    assert!(vcs.commits.max() >= 2);
}

#[tokio::test]
async fn repository_without_matching_commits_is_empty() {
    let vcs = FakeVcs::default().with_log("/work/empty", 0, &[]);
    let repo = scanner(Arc::new(vcs), ScanConfig::new("Nobody"))
        .scan(Path::new("/work/empty"))
        .await
        .unwrap();

    assert!(repo.commits.is_empty());
    assert_eq!((repo.additions, repo.deletions), (0, 0));
}

#[tokio::test]
async fn unreadable_commit_list_is_fatal() {
    let mut vcs = FakeVcs::default();
    vcs.logs
        .insert(PathBuf::from("/work/broken"), (0, "not-a-sha\n".to_string()));

    let err = scanner(Arc::new(vcs), ScanConfig::new("Your Name"))
        .scan(Path::new("/work/broken"))
        .await
        .unwrap_err();

    assert!(matches!(err, SkillmapError::Parse(_)));
}

#[tokio::test]
async fn git_failures_propagate() {
    let vcs = FakeVcs::default();
    let err = scanner(Arc::new(vcs), ScanConfig::new("Your Name"))
        .scan(Path::new("/work/missing"))
        .await
        .unwrap_err();

    assert!(matches!(err, SkillmapError::GitCommand { .. }));
}

#[tokio::test]
async fn malformed_commit_stat_is_fatal() {
    let shas = vec![sha(1), sha(2)];
    let vcs = FakeVcs::default()
        .with_log("/work/racer", 0, &shas)
        .with_stat(&shas[0], 0, "2024-01-01T09:00:00Z\n1\t1\tmain.rs\n")
        .with_stat(&shas[1], 0, "2024-01-01T09:00:00Z\nbinary garbage\n");

    let result = scanner(Arc::new(vcs), ScanConfig::new("Your Name"))
        .scan(Path::new("/work/racer"))
        .await;

    assert!(matches!(result, Err(SkillmapError::Parse(_))));
}

#[test]
fn commit_list_parsing() {
    let list = format!("{}\n\n{}\n", sha(1), sha(2));
    assert_eq!(parse_commit_list(&list).unwrap(), vec![sha(1), sha(2)]);
    assert!(parse_commit_list("").unwrap().is_empty());
    assert!(parse_commit_list("fatal: bad revision").is_err());
}

fn fake_repo(root: &Path, name: &str) -> PathBuf {
    let dir = root.join(name);
    std::fs::create_dir_all(dir.join(".git")).unwrap();
    dir
}

#[test]
fn discovery_lists_only_git_repositories() {
    let root = tempdir().unwrap();
    for name in ["gamma", "alpha", "beta"] {
        fake_repo(root.path(), name);
    }
    std::fs::create_dir(root.path().join("downloads")).unwrap();
    std::fs::write(root.path().join("notes.txt"), "not a repo").unwrap();

    let dirs = discover_repositories(root.path()).unwrap();

    let names: Vec<_> = dirs
        .iter()
        .map(|d| d.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["alpha", "beta", "gamma"]);
}

#[tokio::test]
async fn fleet_scan_keeps_submission_order() {
    let root = tempdir().unwrap();
    let names = ["alpha", "beta", "gamma", "delta"];
    let mut vcs = FakeVcs::default();
    for (i, name) in names.iter().enumerate() {
        let dir = fake_repo(root.path(), name);
        let commit = sha(i as u32 + 1);
        // Earlier repositories answer slower, so completion order is reversed.
        vcs = vcs
            .with_log(dir, 60 - 15 * i as u64, &[commit.clone()])
            .with_stat(&commit, 0, "2024-01-01T09:00:00Z\n1\t0\tmain.rs\n");
    }
    let vcs = Arc::new(vcs);

    let config = ScanConfig::new("Your Name").with_repo_parallelism(2);
    let repos = FleetScanner::new(scanner(vcs.clone(), config))
        .scan(root.path())
        .await
        .unwrap();

    let scanned: Vec<&str> = repos.iter().map(|r| r.name()).collect();
    assert_eq!(scanned, vec!["alpha", "beta", "delta", "gamma"]);
    assert!(repos.iter().all(|r| r.commits.len() == 1));
    assert!(vcs.repos.max() <= 2, "saw {} concurrent repositories", vcs.repos.max());
}

#[tokio::test]
async fn fleet_scan_keeps_repositories_without_commits() {
    let root = tempdir().unwrap();
    let busy = fake_repo(root.path(), "busy");
    let fresh = fake_repo(root.path(), "fresh");
    std::fs::create_dir(root.path().join("photos")).unwrap();
    let commit = sha(7);
    let vcs = FakeVcs::default()
        .with_log(busy, 0, &[commit.clone()])
        .with_log(fresh, 0, &[])
        .with_stat(&commit, 0, "2024-01-01T09:00:00Z\n1\t0\tmain.rs\n");

    let repos = FleetScanner::new(scanner(Arc::new(vcs), ScanConfig::new("Your Name")))
        .scan(root.path())
        .await
        .unwrap();

    let summary: Vec<(&str, usize)> = repos.iter().map(|r| (r.name(), r.commits.len())).collect();
    assert_eq!(summary, vec![("busy", 1), ("fresh", 0)]);
}

#[tokio::test]
async fn fleet_scan_fails_on_unreadable_history() {
    let root = tempdir().unwrap();
    let ok = fake_repo(root.path(), "ok");
    let broken = fake_repo(root.path(), "broken");
    let commit = sha(7);
    let mut vcs = FakeVcs::default()
        .with_log(ok, 0, &[commit.clone()])
        .with_stat(&commit, 0, "2024-01-01T09:00:00Z\n1\t0\tmain.rs\n");
    vcs.logs.insert(broken, (0, "<<garbage>>\n".to_string()));

    let fleet = FleetScanner::new(scanner(Arc::new(vcs), ScanConfig::new("Your Name")));
    let result = fleet.scan(root.path()).await;

    assert!(matches!(result, Err(SkillmapError::Parse(_))));
}

fn has_git() -> bool {
    std::process::Command::new("git").arg("--version").output().is_ok()
}

#[tokio::test]
async fn git_cli_reads_a_repository_without_commits_as_empty() {
    let dir = tempdir().unwrap();
    if !has_git() {
        return;
    }
    assert!(std::process::Command::new("git")
        .arg("init")
        .current_dir(dir.path())
        .status()
        .unwrap()
        .success());

    let log = GitCli::default().commit_log(dir.path(), "Your Name").await.unwrap();
    assert!(log.trim().is_empty());

    let err = GitCli::default()
        .commit_log(&dir.path().join("missing"), "Your Name")
        .await
        .unwrap_err();
    assert!(matches!(err, SkillmapError::GitCommand { .. }));
}
