use super::fetch::{fetch_flat_diffs, load_classifier, scan_repositories};
use super::output::{output_ndjson, output_scan_json, output_scan_table, render_csv, render_svg, slugify, MergedEntry};
use crate::aggregate::{merged, normalized, scaled_dates, trimmed_within, ChangeStats};
use crate::classify::unknown_extensions;
use crate::cli::CommonArgs;
use crate::model::RepositorySummary;
use anyhow::Context;
use console::style;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergedFormat {
    Table,
    Json,
    Ndjson,
    Csv,
}

impl MergedFormat {
    pub fn from_flags(json: bool, ndjson: bool, csv: bool) -> Self {
        if json {
            MergedFormat::Json
        } else if ndjson {
            MergedFormat::Ndjson
        } else if csv {
            MergedFormat::Csv
        } else {
            MergedFormat::Table
        }
    }
}

pub async fn exec_scan(common: &CommonArgs, json: bool, ndjson: bool) -> anyhow::Result<()> {
    let classifier = load_classifier(common)?;
    let repos = scan_repositories(common, classifier, !(json || ndjson)).await?;

    if json {
        output_scan_json(&repos, &common.author)?;
    } else if ndjson {
        let summaries: Vec<RepositorySummary> = repos.iter().map(RepositorySummary::from).collect();
        output_ndjson(&summaries)?;
    } else {
        output_scan_table(&repos)?;
    }
    Ok(())
}

pub async fn exec_merged(common: &CommonArgs, format: MergedFormat, trim_sigmas: Option<f64>) -> anyhow::Result<()> {
    let classifier = load_classifier(common)?;
    let diffs = fetch_flat_diffs(common, classifier, format == MergedFormat::Table)
        .await
        .context("Failed to collect diffs")?;

    let mut buckets = merged(&scaled_dates(&diffs));
    if let Some(sigmas) = trim_sigmas {
        buckets = trimmed_within(&buckets, sigmas);
    }

    match format {
        MergedFormat::Json => {
            let entries: Vec<MergedEntry> = buckets.iter().map(MergedEntry::from).collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        MergedFormat::Ndjson => {
            let entries: Vec<MergedEntry> = buckets.iter().map(MergedEntry::from).collect();
            output_ndjson(&entries)?;
        }
        MergedFormat::Csv => print!("{}", render_csv(&buckets)),
        MergedFormat::Table => {
            println!(
                "{:>6} {:<20} {:>8} {:>8} {:>6} {:>6}",
                style("Day").bold(),
                style("Group").bold(),
                style("Added").bold(),
                style("Deleted").bold(),
                style("Shas").bold(),
                style("Files").bold()
            );
            println!("{}", "─".repeat(60));
            for d in &buckets {
                println!(
                    "{:>6} {:<20} {:>8} {:>8} {:>6} {:>6}",
                    d.date(),
                    d.merged_criteria().unwrap_or("-"),
                    d.additions(),
                    d.deletions(),
                    d.shas().len(),
                    d.files().len()
                );
            }
            if let Some(stats) = ChangeStats::of(&buckets) {
                println!(
                    "\nmean {:.2}  min {}  max {}  sd {:.2}",
                    stats.mean, stats.min, stats.max, stats.standard_deviation
                );
            }
        }
    }
    Ok(())
}

pub async fn exec_plot(
    common: &CommonArgs,
    json: bool,
    out: Option<PathBuf>,
    (width, height): (u32, u32),
    sigmas: f64,
) -> anyhow::Result<()> {
    let classifier = load_classifier(common)?;
    let diffs = fetch_flat_diffs(common, classifier, !json)
        .await
        .context("Failed to collect diffs")?;

    let buckets = merged(&scaled_dates(&diffs));
    let points = normalized(&trimmed_within(&buckets, sigmas));

    if json {
        println!("{}", serde_json::to_string_pretty(&points)?);
        return Ok(());
    }

    let out = out.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out).with_context(|| format!("Failed to create {}", out.display()))?;
    for (group, group_points) in &points {
        let path = out.join(format!("{}-{}.svg", common.criteria.as_str(), slugify(group)));
        std::fs::write(&path, render_svg(width, height, group_points))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} {} ({} points)", style("wrote").green(), path.display(), group_points.len());
    }
    Ok(())
}

pub async fn exec_unknown(common: &CommonArgs, json: bool) -> anyhow::Result<()> {
    let classifier = load_classifier(common)?;
    let repos = scan_repositories(common, classifier, !json).await?;
    let unknown = unknown_extensions(repos.iter().flat_map(|r| r.files()));

    if json {
        let map: serde_json::Map<String, serde_json::Value> = unknown
            .into_iter()
            .map(|(ext, count)| (ext, serde_json::Value::from(count)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else if unknown.is_empty() {
        println!("Every changed file was classified");
    } else {
        for (ext, count) in unknown {
            println!("{:<20} {:>6}", ext, count);
        }
    }
    Ok(())
}
