//! Logship daemon - background upload agent
//!
//! `logshipd` (or `logshipd run`) runs as a user service and uploads the
//! files a producer drops into the output directory whenever a trigger
//! fires: a directory change, the network coming back, the share interval
//! elapsing. The remaining subcommands are one-shot helpers:
//!
//! - `upload-now` - run one job in the foreground and print its report
//! - `config show|validate|path` - inspect the configuration file
//! - `queue` - list what the next job would upload
//!
//! SIGHUP reloads the configuration; SIGTERM and Ctrl+C shut down
//! gracefully, letting an in-flight transfer session finish.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use logship_core::config::{Config, LoggingConfig};

mod commands;
mod network;
mod notifier;
mod output;
mod service;
mod share;

use commands::{
    config::ConfigCommand, queue::QueueCommand, run::RunCommand, upload_now::UploadNowCommand,
};
use output::{Output, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "logshipd", version, about = "Background upload agent for Logship")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the agent in the foreground (default)
    Run(RunCommand),
    /// Upload the queued files once and print the report
    UploadNow(UploadNowCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// List the files the next job would upload
    Queue(QueueCommand),
}

/// Log filter directive for the configured level and `-v` count
fn filter_directive(logging: &LoggingConfig, verbose: u8) -> String {
    match verbose {
        0 => logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(logging, verbose)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    init_tracing(&Config::load_or_default(&config_path).logging, cli.verbose);

    let out = Output::new(OutputFormat::from_flag(cli.json));
    match cli.command {
        None => RunCommand::default().execute(&config_path).await,
        Some(Commands::Run(cmd)) => cmd.execute(&config_path).await,
        Some(Commands::UploadNow(cmd)) => cmd.execute(&config_path, out).await,
        Some(Commands::Config(cmd)) => cmd.execute(&config_path, out).await,
        Some(Commands::Queue(cmd)) => cmd.execute(&config_path, out).await,
    }
}
