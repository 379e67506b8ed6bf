use crate::aggregate::PlotPoint;
use crate::flat::FlatDiff;
use crate::model::{Repository, RepositorySummary, ScanOutput, SCHEMA_VERSION};
use anyhow::Result;
use chrono::Utc;
use console::style;
use serde::Serialize;

const POINT_RADIUS: f64 = 5.0;

/// Renderer-facing view of a merged diff.
#[derive(Debug, Clone, Serialize)]
pub struct MergedEntry {
    pub date: i64,
    pub criteria: Option<String>,
    pub additions: u64,
    pub deletions: u64,
    pub root: String,
    pub shas: Vec<String>,
    pub files: Vec<String>,
}

impl From<&FlatDiff> for MergedEntry {
    fn from(diff: &FlatDiff) -> Self {
        Self {
            date: diff.date(),
            criteria: diff.merged_criteria().map(str::to_string),
            additions: diff.additions(),
            deletions: diff.deletions(),
            root: diff.root().path().to_string(),
            shas: diff.shas().iter().cloned().collect(),
            files: diff.files().iter().map(|f| f.path().to_string()).collect(),
        }
    }
}

pub fn output_scan_json(repos: &[Repository], author: &str) -> Result<()> {
    let output = ScanOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        author: author.to_string(),
        repositories: repos.iter().map(RepositorySummary::from).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn output_ndjson<T: Serialize>(items: &[T]) -> Result<()> {
    for item in items {
        println!("{}", serde_json::to_string(item)?);
    }
    Ok(())
}

pub fn output_scan_table(repos: &[Repository]) -> Result<()> {
    if repos.is_empty() {
        println!("No repositories found");
        return Ok(());
    }

    println!(
        "{:<40} {:>8} {:>10} {:>10}  {}",
        style("Repository").bold(),
        style("Commits").bold(),
        style("Added").bold(),
        style("Deleted").bold(),
        style("Active").bold()
    );
    println!("{}", "─".repeat(96));
    for repo in repos {
        let summary = RepositorySummary::from(repo);
        let active = match (summary.first_commit, summary.last_commit) {
            (Some(first), Some(last)) => format!("{} to {}", first.format("%Y-%m-%d"), last.format("%Y-%m-%d")),
            _ => "-".to_string(),
        };
        println!(
            "{:<40} {:>8} {:>10} {:>10}  {}",
            summary.name,
            summary.commits,
            style(summary.additions).green(),
            style(summary.deletions).red(),
            style(active).dim()
        );
    }

    let commits: usize = repos.iter().map(|r| r.commits.len()).sum();
    let added: u64 = repos.iter().map(|r| r.additions).sum();
    let deleted: u64 = repos.iter().map(|r| r.deletions).sum();
    println!(
        "\n{} repositories, {} commits, {} added, {} deleted",
        style(repos.len()).cyan(),
        style(commits).cyan(),
        style(added).green(),
        style(deleted).red()
    );
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One row per diff: `date,criteria,additions,deletions,shas,files`.
/// Multiple SHAs and files are space separated.
pub fn render_csv(diffs: &[FlatDiff]) -> String {
    let mut out = String::from("date,criteria,additions,deletions,shas,files\n");
    for diff in diffs {
        let entry = MergedEntry::from(diff);
        let row = [
            entry.date.to_string(),
            csv_field(entry.criteria.as_deref().unwrap_or("")),
            entry.additions.to_string(),
            entry.deletions.to_string(),
            csv_field(&entry.shas.join(" ")),
            csv_field(&entry.files.join(" ")),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Scales unit-square points into a `width` x `height` viewBox, keeping a
/// point radius of margin on every side.
pub fn render_svg(width: u32, height: u32, points: &[PlotPoint]) -> String {
    let (w, h) = (width as f64, height as f64);
    let mut out = format!("<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {width} {height}\">\n");
    for p in points {
        let cx = POINT_RADIUS + p.x * (w - 2.0 * POINT_RADIUS);
        let cy = POINT_RADIUS + p.y * (h - 2.0 * POINT_RADIUS);
        out.push_str(&format!(
            "  <circle cx=\"{cx:.2}\" cy=\"{cy:.2}\" r=\"{POINT_RADIUS}\"><title>{}</title></circle>\n",
            xml_escape(&p.label)
        ));
    }
    out.push_str("</svg>\n");
    out
}

/// File-name friendly form of a classification name (`C++` -> `cpp`).
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '+' => slug.push('p'),
            '#' => slug.push_str("sharp"),
            c if c.is_ascii_alphanumeric() => slug.push(c.to_ascii_lowercase()),
            _ => {
                if !slug.is_empty() && !slug.ends_with('-') {
                    slug.push('-');
                }
            }
        }
    }
    slug.trim_end_matches('-').to_string()
}
