// JSON report persistence for every pipeline stage

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// A stage report stamped with the time it was generated.
#[derive(Debug, Serialize)]
pub struct TimestampedReport<'a, T: Serialize> {
    pub timestamp: String,
    #[serde(flatten)]
    pub body: &'a T,
}

impl<'a, T: Serialize> TimestampedReport<'a, T> {
    pub fn now(body: &'a T) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            body,
        }
    }
}

pub fn generate_json_report<T: Serialize>(body: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&TimestampedReport::now(body))
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Serialize `body` with a timestamp and write it to `path`.
pub fn write_json_report<T: Serialize>(body: &T, path: &Path) -> Result<()> {
    let content = generate_json_report(body).context("Failed to serialize report")?;
    save_report(&content, path)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

/// One URL per line, newline terminated.
pub fn write_url_list(urls: &[String], path: &Path) -> Result<()> {
    let mut content = urls.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    save_report(&content, path)
        .with_context(|| format!("Failed to write URL list to {}", path.display()))
}

/// Read a JSON document written by an earlier stage or run.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
