use crate::classify::Classifier;
use crate::error::{Result, SkillmapError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

pub const SCHEMA_VERSION: u32 = 2;

pub const SHA_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub language: String,
}

impl Classification {
    pub fn new(category: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            language: language.into(),
        }
    }
}

/// A path plus the classification resolved for it at construction.
///
/// Equality, ordering and hashing only look at the path.
#[derive(Debug, Clone, Serialize)]
pub struct FileRef {
    path: String,
    classification: Option<Classification>,
}

impl FileRef {
    pub fn new(path: impl Into<String>, classifier: &dyn Classifier) -> Self {
        let mut file = Self::unclassified(path);
        file.classification = classifier.classify(file.extension());
        file
    }

    /// Used for repository roots, which are directories and never classified.
    pub fn unclassified(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            classification: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        let trimmed = self.path.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// Text after the last `.` of the file name, or the whole name when it
    /// has no dot (so `Makefile` classifies as `makefile`).
    pub fn extension(&self) -> &str {
        let name = self.name();
        name.rsplit('.').next().unwrap_or(name)
    }

    pub fn classification(&self) -> Option<&Classification> {
        self.classification.as_ref()
    }
}

impl PartialEq for FileRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FileRef {}

impl Hash for FileRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialOrd for FileRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileDiff {
    pub additions: u64,
    pub deletions: u64,
    pub file: FileRef,
}

impl FileDiff {
    /// Parses one `git --numstat` line: `<additions> <deletions> <path>`.
    ///
    /// Columns may be separated by any run of whitespace. Binary entries
    /// (`-` counts) read as zero.
    pub fn parse(line: &str, classifier: &dyn Classifier) -> Result<Self> {
        let malformed = || SkillmapError::Parse(format!("Malformed numstat line: '{line}'"));

        let (adds, rest) = split_token(line).ok_or_else(malformed)?;
        let (dels, rest) = split_token(rest).ok_or_else(malformed)?;
        let path = rest.trim();
        if path.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            additions: parse_count(adds, line)?,
            deletions: parse_count(dels, line)?,
            file: FileRef::new(resolve_rename(&unquote_path(path)), classifier),
        })
    }

    pub fn is_noop(&self) -> bool {
        self.additions == 0 && self.deletions == 0
    }

    pub fn changes(&self) -> u64 {
        self.additions + self.deletions
    }
}

fn split_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let end = s.find(char::is_whitespace)?;
    Some((&s[..end], &s[end..]))
}

fn parse_count(token: &str, line: &str) -> Result<u64> {
    if token == "-" {
        return Ok(0);
    }
    token
        .parse::<u64>()
        .map_err(|e| SkillmapError::Parse(format!("Invalid count '{token}' in numstat line '{line}': {e}")))
}

/// Undoes git's C-style path quoting (`"caf\303\251.rs"`), which git applies
/// to paths with non-ASCII or control bytes unless `core.quotePath` is off.
/// Unquoted paths are returned as they are.
pub(crate) fn unquote_path(path: &str) -> String {
    let Some(inner) = path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) else {
        return path.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('r') => bytes.push(b'\r'),
            Some('a') => bytes.push(0x07),
            Some('b') => bytes.push(0x08),
            Some('f') => bytes.push(0x0c),
            Some('v') => bytes.push(0x0b),
            Some(d @ '0'..='7') => {
                let mut value = d as u32 - '0' as u32;
                for _ in 0..2 {
                    match chars.peek() {
                        Some(&o @ '0'..='7') => {
                            value = value * 8 + (o as u32 - '0' as u32);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                bytes.push(value as u8);
            }
            Some(other) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => bytes.push(b'\\'),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Resolves numstat rename notation to the destination path:
/// `old => new` and `dir/{old => new}/file`.
pub(crate) fn resolve_rename(path: &str) -> String {
    if let (Some(open), Some(close)) = (path.find('{'), path.rfind('}')) {
        if open < close {
            if let Some((_, new)) = path[open + 1..close].split_once(" => ") {
                let joined = format!("{}{}{}", &path[..open], new, &path[close + 1..]);
                return joined.replace("//", "/");
            }
        }
    }
    match path.split_once(" => ") {
        Some((_, new)) => new.to_string(),
        None => path.to_string(),
    }
}

pub fn validate_sha(sha: &str) -> Result<()> {
    if sha.len() == SHA_LEN && sha.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(SkillmapError::InvalidSha(sha.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Commit {
    pub sha: String,
    pub timestamp: DateTime<Utc>,
    pub file_diffs: Vec<FileDiff>,
    pub additions: u64,
    pub deletions: u64,
}

impl Commit {
    pub fn new(sha: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sha: sha.into(),
            timestamp,
            file_diffs: Vec::new(),
            additions: 0,
            deletions: 0,
        }
    }

    /// Builds a commit from the output of
    /// `git show --numstat --format=%ad --date=iso-strict <sha>`:
    /// the timestamp on the first line, numstat lines after it.
    pub fn parse(sha: &str, output: &str, classifier: &dyn Classifier) -> Result<Self> {
        validate_sha(sha)?;
        let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());

        let date = lines
            .next()
            .ok_or_else(|| SkillmapError::Parse(format!("Empty commit stat output for {sha}")))?;
        let timestamp = parse_timestamp(date)?;

        let mut commit = Self::new(sha, timestamp);
        for line in lines {
            commit.push_diff(FileDiff::parse(line, classifier)?);
        }
        Ok(commit)
    }

    /// Appends a diff and accumulates its counts. No-op diffs are dropped.
    pub fn push_diff(&mut self, diff: FileDiff) {
        if diff.is_noop() {
            return;
        }
        self.additions += diff.additions;
        self.deletions += diff.deletions;
        self.file_diffs.push(diff);
    }
}

pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(input.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SkillmapError::InvalidDate(format!("'{input}': {e}")))
}

#[derive(Debug, Clone, Serialize)]
pub struct Repository {
    pub root: FileRef,
    pub commits: Vec<Commit>,
    pub additions: u64,
    pub deletions: u64,
}

impl Repository {
    pub fn new(root: FileRef) -> Self {
        Self {
            root,
            commits: Vec::new(),
            additions: 0,
            deletions: 0,
        }
    }

    pub fn name(&self) -> &str {
        self.root.name()
    }

    pub fn push_commit(&mut self, commit: Commit) {
        self.additions += commit.additions;
        self.deletions += commit.deletions;
        self.commits.push(commit);
    }

    /// Commits arrive in completion order; this restores chronological order.
    pub fn sort_commits(&mut self) {
        self.commits
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.sha.cmp(&b.sha)));
    }

    pub fn files(&self) -> impl Iterator<Item = &FileRef> {
        self.commits
            .iter()
            .flat_map(|c| c.file_diffs.iter().map(|d| &d.file))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub path: String,
    pub name: String,
    pub commits: usize,
    pub additions: u64,
    pub deletions: u64,
    pub first_commit: Option<DateTime<Utc>>,
    pub last_commit: Option<DateTime<Utc>>,
}

impl From<&Repository> for RepositorySummary {
    fn from(repo: &Repository) -> Self {
        Self {
            path: repo.root.path().to_string(),
            name: repo.name().to_string(),
            commits: repo.commits.len(),
            additions: repo.additions,
            deletions: repo.deletions,
            first_commit: repo.commits.iter().map(|c| c.timestamp).min(),
            last_commit: repo.commits.iter().map(|c| c.timestamp).max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub author: String,
    pub repositories: Vec<RepositorySummary>,
}
