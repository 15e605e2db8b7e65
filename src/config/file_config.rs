use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Connection settings (can override CLI)
    pub server_url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub request_timeout_sec: Option<u64>,

    /// File extensions admitted into albums, with or without the leading dot
    pub valid_extensions: Option<Vec<String>>,
    /// Part size for songs uploaded in parts, in megabytes
    pub max_part_size_mb: Option<u32>,

    // Session tuning
    pub message_log_capacity: Option<usize>,
    pub event_channel_capacity: Option<usize>,
    pub trigger_scan_after_upload: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
