//! CLI subcommands

pub mod config;
pub mod queue;
pub mod run;
pub mod upload_now;
