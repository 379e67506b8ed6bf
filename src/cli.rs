use crate::aggregate::TRIM_SIGMAS;
use crate::flat::MergeCriteria;
use crate::git::DEFAULT_PARALLELISM;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skillmap")]
#[command(about = "Mine an author's change history across git repositories and aggregate it per language")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Directory whose subdirectories are repositories (default: current dir)")]
    pub root: Option<PathBuf>,

    #[arg(long, help = "Scan a single repository instead of a directory of them", conflicts_with = "root")]
    pub repo: Option<PathBuf>,

    #[arg(long, help = "Author name passed to git log --author")]
    pub author: String,

    #[arg(long, help = "Snapshot cache file (.db/.sqlite for SQLite, anything else for JSON)")]
    pub cache: Option<PathBuf>,

    #[arg(long, help = "Discard the cached snapshot and rescan", default_value_t = false)]
    pub refresh: bool,

    #[arg(long, help = "Concurrent git queries per repository", default_value_t = DEFAULT_PARALLELISM)]
    pub commit_jobs: usize,

    #[arg(long, help = "Repositories scanned concurrently", default_value_t = DEFAULT_PARALLELISM)]
    pub repo_jobs: usize,

    #[arg(long, help = "JSON file extending the built-in extension table")]
    pub classifier: Option<PathBuf>,

    #[arg(long, value_enum, help = "Classification used to merge and group diffs", default_value_t = MergeCriteria::Language)]
    pub criteria: MergeCriteria,

    #[arg(long, help = "git executable", default_value = "git")]
    pub git: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Per-repository commit and line totals
    Scan {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,
    },
    /// Day-bucketed diffs merged by classification
    Merged {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,

        #[arg(long, help = "Output as CSV")]
        csv: bool,

        #[arg(long, help = "Drop change-size outliers")]
        trim: bool,

        #[arg(long, help = "Outlier bound in standard deviations", default_value_t = TRIM_SIGMAS, value_parser = parse_sigmas)]
        sigmas: f64,
    },
    /// Normalized plot points, one SVG per classification
    Plot {
        #[arg(long, help = "Output points as JSON")]
        json: bool,

        #[arg(long, help = "Directory to write SVG files into")]
        out: Option<PathBuf>,

        #[arg(long, default_value_t = 800)]
        width: u32,

        #[arg(long, default_value_t = 600)]
        height: u32,

        #[arg(long, help = "Outlier bound in standard deviations", default_value_t = TRIM_SIGMAS, value_parser = parse_sigmas)]
        sigmas: f64,
    },
    /// Extensions missing from the classifier table
    Unknown {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
}

/// A trim bound must be a finite, positive number of standard deviations.
fn parse_sigmas(s: &str) -> std::result::Result<f64, String> {
    let sigmas: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if sigmas.is_finite() && sigmas > 0.0 {
        Ok(sigmas)
    } else {
        Err(format!("must be a positive number of standard deviations, got {s}"))
    }
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Scan { json, ndjson } => crate::report::exec_scan(&self.common, json, ndjson).await,
            Commands::Merged {
                json,
                ndjson,
                csv,
                trim,
                sigmas,
            } => {
                let format = crate::report::MergedFormat::from_flags(json, ndjson, csv);
                let sigmas = trim.then_some(sigmas);
                crate::report::exec_merged(&self.common, format, sigmas).await
            }
            Commands::Plot {
                json,
                out,
                width,
                height,
                sigmas,
            } => crate::report::exec_plot(&self.common, json, out, (width, height), sigmas).await,
            Commands::Unknown { json } => crate::report::exec_unknown(&self.common, json).await,
        }
    }
}
