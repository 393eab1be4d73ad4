//! Config command - inspect and validate the configuration file
//!
//! `show` prints the effective configuration with the password masked,
//! `validate` loads the file strictly and lists every problem, and `path`
//! prints where the file is expected.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use logship_core::config::Config;

use crate::output::Output;

const MASK: &str = "********";

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, config_path: &Path, out: Output) -> Result<()> {
        match self {
            ConfigCommand::Show => show(config_path, out),
            ConfigCommand::Validate => validate(config_path, out),
            ConfigCommand::Path => {
                if out.is_json() {
                    out.value(&serde_json::json!({
                        "config_path": config_path.display().to_string(),
                        "exists": config_path.exists(),
                    }))
                } else {
                    println!("{}", config_path.display());
                    Ok(())
                }
            }
        }
    }
}

/// Copy of `config` that is safe to print
fn masked(config: &Config) -> Config {
    let mut config = config.clone();
    if !config.upload.password.is_empty() {
        config.upload.password = MASK.to_string();
    }
    config
}

fn show(config_path: &Path, out: Output) -> Result<()> {
    let config = masked(&Config::load_or_default(config_path));
    info!(config_path = %config_path.display(), "Showing configuration");

    if out.is_json() {
        return out.value(&config);
    }
    out.success(&format!("Configuration ({})", config_path.display()));
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
    for line in yaml.lines() {
        out.line(line);
    }
    Ok(())
}

/// Problems found in the file at `config_path`, as display strings
fn problems(config_path: &Path) -> Vec<String> {
    if !config_path.exists() {
        return vec!["configuration file not found, defaults apply".to_string()];
    }
    match Config::load(config_path) {
        Ok(config) => config.validate().iter().map(|e| e.to_string()).collect(),
        Err(e) => vec![format!("failed to parse configuration: {e}")],
    }
}

fn validate(config_path: &Path, out: Output) -> Result<()> {
    info!(config_path = %config_path.display(), "Validating configuration");
    let problems = problems(config_path);

    if out.is_json() {
        return out.value(&serde_json::json!({
            "valid": problems.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": problems,
        }));
    }
    if problems.is_empty() {
        out.success("Configuration is valid");
        out.line(&format!("File: {}", config_path.display()));
        return Ok(());
    }
    out.error(&format!(
        "Configuration has {} problem{}:",
        problems.len(),
        if problems.len() == 1 { "" } else { "s" }
    ));
    out.line(&format!("File: {}", config_path.display()));
    for problem in &problems {
        out.line(&format!("  {problem}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use logship_core::config::ConfigBuilder;

    #[test]
    fn test_password_is_masked() {
        let config = ConfigBuilder::new()
            .upload_credentials("logger", "hunter2")
            .build();
        let shown = masked(&config);
        assert_eq!(shown.upload.password, MASK);
        assert_eq!(shown.upload.login, "logger");

        let empty = masked(&Config::default());
        assert!(empty.upload.password.is_empty());
    }

    #[test]
    fn test_problems_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let problems = problems(&dir.path().join("absent.yaml"));
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("not found"));
    }

    #[test]
    fn test_problems_for_unparsable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "upload: 42\n").unwrap();
        let problems = problems(&path);
        assert!(problems[0].starts_with("failed to parse"));
    }

    #[test]
    fn test_problems_list_invalid_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        ConfigBuilder::new()
            .upload_enabled(true)
            .logging_level("loud")
            .build()
            .save(&path)
            .unwrap();

        let problems = problems(&path);
        assert!(problems.iter().any(|p| p.contains("upload.url")));
        assert!(problems.iter().any(|p| p.contains("logging.level")));
    }

    #[test]
    fn test_valid_file_has_no_problems() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        ConfigBuilder::new()
            .watch_directory(dir.path().to_path_buf())
            .build()
            .save(&path)
            .unwrap();
        assert!(problems(&path).is_empty());
    }
}
