pub mod aggregate;
pub mod cache;
pub mod classify;
pub mod cli;
pub mod error;
pub mod flat;
pub mod git;
pub mod model;
pub mod queue;
pub mod report;
