pub mod config;
pub mod fleet;
pub mod repo;
pub mod vcs;

pub use config::{ScanConfig, DEFAULT_PARALLELISM};
pub use fleet::{discover_repositories, FleetScanner};
pub use repo::{parse_commit_list, RepoScanner};
pub use vcs::{GitCli, Vcs};
