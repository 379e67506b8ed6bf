pub mod exec;
pub mod fetch;
pub mod output;

pub use exec::{exec_merged, exec_plot, exec_scan, exec_unknown, MergedFormat};
pub use fetch::{fetch_flat_diffs, load_classifier, scan_config, scan_repositories, snapshot_key};
pub use output::{render_csv, render_svg, slugify, MergedEntry};
