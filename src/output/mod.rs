use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod formatter;
pub mod reporter;
pub mod webhook;

pub use reporter::Reporter;
pub use webhook::WebhookNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "text" | "txt" => OutputFormat::Text,
            _ => OutputFormat::Text,
        }
    }
}

pub fn add_file_extension(path: &str, format: &OutputFormat) -> String {
    let extension = match format {
        OutputFormat::Text => ".txt",
        OutputFormat::Json => ".json",
    };

    if path.ends_with(extension) {
        path.to_string()
    } else {
        format!("{}{}", path, extension)
    }
}

/// One ranked line of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Chat mention, or the account name when nobody is linked to it
    pub name: String,
    pub account: String,
    pub contributions: u32,
    pub last_active_date: Option<NaiveDate>,
    pub last_commit: Option<String>,
}

#[cfg(test)]
impl ReportEntry {
    pub fn new(name: &str, contributions: u32) -> Self {
        Self {
            name: name.to_string(),
            account: name.to_string(),
            contributions,
            last_active_date: None,
            last_commit: None,
        }
    }
}

/// Discord embed as accepted by incoming webhooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

pub trait OutputGenerator {
    fn generate(&self, as_of: NaiveDate, entries: &[ReportEntry]) -> Result<String>;
}
