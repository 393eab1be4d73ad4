//! Human or JSON output for the one-shot commands

use serde::Serialize;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Writes command results in the selected format
///
/// Human lines go to stdout, problems to stderr. In JSON mode only
/// [`Output::value`] and [`Output::error`] print anything.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn success(&self, message: &str) {
        if !self.is_json() {
            println!("\u{2713} {message}");
        }
    }

    pub fn line(&self, message: &str) {
        if !self.is_json() {
            println!("  {message}");
        }
    }

    pub fn warn(&self, message: &str) {
        if !self.is_json() {
            eprintln!("\u{26a0} {message}");
        }
    }

    pub fn error(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("\u{2717} Error: {message}"),
            OutputFormat::Json => {
                eprintln!("{}", serde_json::json!({"success": false, "error": message}))
            }
        }
    }

    /// Prints `value` as pretty JSON in JSON mode
    pub fn value<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        if self.is_json() {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Ok(())
    }
}
