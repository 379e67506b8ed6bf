//! Self-contained diff records.
//!
//! A [`FlatDiff`] is cut loose from the `Repository -> Commit -> FileDiff`
//! tree it was built from: it stores the root path, commit SHAs and files by
//! value, so it can be merged, persisted and handed to renderers freely.

use crate::classify::Classifier;
use crate::model::{Classification, Commit, FileDiff, FileRef, Repository};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The classification dimension diffs are grouped and merged by.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum MergeCriteria {
    #[default]
    Language,
    Category,
}

impl MergeCriteria {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeCriteria::Language => "language",
            MergeCriteria::Category => "category",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "language" => Some(MergeCriteria::Language),
            "category" => Some(MergeCriteria::Category),
            _ => None,
        }
    }

    pub fn select<'a>(&self, classification: &'a Classification) -> &'a str {
        match self {
            MergeCriteria::Language => &classification.language,
            MergeCriteria::Category => &classification.category,
        }
    }
}

/// Aggregated change record.
///
/// SHA and file sets only ever grow, and `additions`/`deletions` always equal
/// the sums over every diff folded in.
#[derive(Debug, Clone)]
pub struct FlatDiff {
    root: FileRef,
    shas: BTreeSet<String>,
    files: Vec<FileRef>,
    date: i64,
    additions: u64,
    deletions: u64,
    criteria: MergeCriteria,
}

impl FlatDiff {
    pub fn new(
        root: FileRef,
        sha: impl Into<String>,
        file: FileRef,
        date: i64,
        additions: u64,
        deletions: u64,
        criteria: MergeCriteria,
    ) -> Self {
        Self {
            root,
            shas: BTreeSet::from([sha.into()]),
            files: vec![file],
            date,
            additions,
            deletions,
            criteria,
        }
    }

    /// Flattens one diff of `commit` in `repo`. The date is the commit time
    /// in epoch milliseconds.
    pub fn from_diff(repo: &Repository, commit: &Commit, diff: &FileDiff, criteria: MergeCriteria) -> Self {
        Self::new(
            repo.root.clone(),
            commit.sha.clone(),
            diff.file.clone(),
            commit.timestamp.timestamp_millis(),
            diff.additions,
            diff.deletions,
            criteria,
        )
    }

    pub fn root(&self) -> &FileRef {
        &self.root
    }

    pub fn shas(&self) -> &BTreeSet<String> {
        &self.shas
    }

    pub fn files(&self) -> &[FileRef] {
        &self.files
    }

    pub fn date(&self) -> i64 {
        self.date
    }

    pub fn additions(&self) -> u64 {
        self.additions
    }

    pub fn deletions(&self) -> u64 {
        self.deletions
    }

    pub fn changes(&self) -> u64 {
        self.additions + self.deletions
    }

    pub fn criteria(&self) -> MergeCriteria {
        self.criteria
    }

    /// Same record with a different date.
    pub fn with_date(&self, date: i64) -> Self {
        Self {
            date,
            ..self.clone()
        }
    }

    /// Classification of the first contributing file along `criteria`.
    pub fn merged_criteria(&self) -> Option<&str> {
        self.files
            .first()
            .and_then(|f| f.classification())
            .map(|c| self.criteria.select(c))
    }

    fn classifications(&self) -> BTreeSet<Option<&str>> {
        self.files
            .iter()
            .map(|f| f.classification().map(|c| self.criteria.select(c)))
            .collect()
    }

    /// Same date, same criteria and the same set of classifications.
    pub fn can_merge(&self, other: &FlatDiff) -> bool {
        self.date == other.date
            && self.criteria == other.criteria
            && self.classifications() == other.classifications()
    }

    /// Folds `other` into `self`. Returns `false` and leaves `self`
    /// untouched when the two are not compatible.
    pub fn merge(&mut self, other: &FlatDiff) -> bool {
        if !self.can_merge(other) {
            return false;
        }
        self.additions += other.additions;
        self.deletions += other.deletions;
        self.shas.extend(other.shas.iter().cloned());
        for file in &other.files {
            if !self.files.contains(file) {
                self.files.push(file.clone());
            }
        }
        true
    }

    /// Non-destructive form of [`merge`](Self::merge).
    pub fn merged_with(&self, other: &FlatDiff) -> Option<FlatDiff> {
        let mut merged = self.clone();
        merged.merge(other).then_some(merged)
    }

    pub fn to_record(&self) -> FlatDiffRecord {
        FlatDiffRecord {
            root: self.root.path().to_string(),
            shas: self.shas.iter().cloned().collect(),
            files: self.files.iter().map(|f| f.path().to_string()).collect(),
            date: self.date,
            additions: self.additions,
            deletions: self.deletions,
            criteria: self.criteria,
        }
    }

    /// Rebuilds a diff from its persisted form, classifying each file again.
    pub fn from_record(record: &FlatDiffRecord, classifier: &dyn Classifier) -> Self {
        let mut files: Vec<FileRef> = Vec::with_capacity(record.files.len());
        for path in &record.files {
            let file = FileRef::new(path.clone(), classifier);
            if !files.contains(&file) {
                files.push(file);
            }
        }
        Self {
            root: FileRef::unclassified(record.root.clone()),
            shas: record.shas.iter().cloned().collect(),
            files,
            date: record.date,
            additions: record.additions,
            deletions: record.deletions,
            criteria: record.criteria,
        }
    }
}

/// Serializable form of a [`FlatDiff`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatDiffRecord {
    pub root: String,
    pub shas: Vec<String>,
    pub files: Vec<String>,
    pub date: i64,
    pub additions: u64,
    pub deletions: u64,
    #[serde(default)]
    pub criteria: MergeCriteria,
}

/// One record per classified diff in `repo`. Unclassified files are skipped.
pub fn flatten_repository(repo: &Repository, criteria: MergeCriteria) -> Vec<FlatDiff> {
    repo.commits
        .iter()
        .flat_map(|commit| {
            commit
                .file_diffs
                .iter()
                .filter(|diff| diff.file.classification().is_some())
                .map(move |diff| FlatDiff::from_diff(repo, commit, diff, criteria))
        })
        .collect()
}

pub fn flatten_all(repos: &[Repository], criteria: MergeCriteria) -> Vec<FlatDiff> {
    repos
        .iter()
        .flat_map(|repo| flatten_repository(repo, criteria))
        .collect()
}
