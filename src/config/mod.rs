mod file_config;

pub use file_config::FileConfig;

use anyhow::{bail, Result};

use crate::uploader::normalize_extension;

pub const DEFAULT_VALID_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "ogg", "wav"];
pub const DEFAULT_MAX_PART_SIZE_MB: u32 = 5;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub server_url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub request_timeout_sec: u64,
}

/// Runtime settings shared with the backend. Reloadable while the session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploaderSettings {
    pub server_url: String,
    pub user: String,
    pub password: String,
    pub valid_extensions: Vec<String>,
    /// Part size requested for multipart uploads, in megabytes
    pub max_part_size_mb: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub uploader: UploaderSettings,
    pub request_timeout_sec: u64,
    pub message_log_capacity: usize,
    pub event_channel_capacity: usize,
    pub trigger_scan_after_upload: bool,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let server_url = file
            .server_url
            .or_else(|| cli.server_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("server_url must be specified via --server-url or in config file")
            })?;
        let server_url = server_url.trim_end_matches('/').to_string();
        if !(server_url.starts_with("http://") || server_url.starts_with("https://")) {
            bail!("server_url must start with http:// or https://: {}", server_url);
        }

        let user = file.user.or_else(|| cli.user.clone()).unwrap_or_default();
        let password = file
            .password
            .or_else(|| cli.password.clone())
            .unwrap_or_default();

        let valid_extensions: Vec<String> = file
            .valid_extensions
            .unwrap_or_else(|| {
                DEFAULT_VALID_EXTENSIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            })
            .iter()
            .map(|ext| normalize_extension(ext))
            .filter(|ext| !ext.is_empty())
            .collect();
        if valid_extensions.is_empty() {
            bail!("valid_extensions must contain at least one extension");
        }

        let max_part_size_mb = file.max_part_size_mb.unwrap_or(DEFAULT_MAX_PART_SIZE_MB);
        if max_part_size_mb == 0 {
            bail!("max_part_size_mb must be greater than zero");
        }

        let request_timeout_sec = file.request_timeout_sec.unwrap_or(cli.request_timeout_sec);
        let message_log_capacity = file.message_log_capacity.unwrap_or(500);
        let event_channel_capacity = file.event_channel_capacity.unwrap_or(100);
        if event_channel_capacity == 0 {
            bail!("event_channel_capacity must be greater than zero");
        }
        let trigger_scan_after_upload = file.trigger_scan_after_upload.unwrap_or(true);

        Ok(Self {
            uploader: UploaderSettings {
                server_url,
                user,
                password,
                valid_extensions,
                max_part_size_mb,
            },
            request_timeout_sec,
            message_log_capacity,
            event_channel_capacity,
            trigger_scan_after_upload,
        })
    }
}
