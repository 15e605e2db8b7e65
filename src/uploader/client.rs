//! HTTP client for the remote music uploader server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::UploaderSettings;

use super::album_upload::SongUploader;
use super::error::UploaderResult;
use super::handle::UploaderHandle;
use super::models::{AlbumMetadata, SongRef};
use super::multipart::{
    upload_in_parts, DeclareUploadRequest, DeclareUploadResponse, PartTransport,
    MEGABYTE_BYTES, MULTIPART_THRESHOLD_BYTES,
};

#[derive(Error, Debug)]
pub enum UploaderClientError {
    #[error("unhappy response: ({0}) {1}")]
    UnhappyResponse(u16, String),
    #[error("Request to the server failed: {0}")]
    Request(String),
    #[error("Failed to read {0}: {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Local settings are misconfigured: {0}")]
    BadConfig(String),
    #[error("Failed to parse server response: {0}")]
    ParseResponse(String),
    #[error("Multipart upload failed: {0}")]
    MultipartFailure(String),
}

/// Client for the uploader server.
///
/// Credentials and the server URL are read from the shared settings on every
/// request, so a settings reload takes effect immediately.
#[derive(Clone)]
pub struct MusicUploaderClient {
    client: Client,
    settings: Arc<RwLock<UploaderSettings>>,
}

impl MusicUploaderClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `settings` - Shared uploader settings (server URL and credentials)
    /// * `timeout_secs` - Request timeout in seconds
    pub fn new(
        settings: Arc<RwLock<UploaderSettings>>,
        timeout_secs: u64,
    ) -> Result<Self, UploaderClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| UploaderClientError::BadConfig(e.to_string()))?;
        Ok(Self { client, settings })
    }

    async fn build_url(&self, route: &str) -> String {
        let settings = self.settings.read().await;
        format!("{}/{}", settings.server_url.trim_end_matches('/'), route)
    }

    async fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        let settings = self.settings.read().await;
        request.basic_auth(settings.user.clone(), Some(settings.password.clone()))
    }

    /// Check the server is reachable.
    pub async fn check_conn(&self) -> Result<String, UploaderClientError> {
        let url = self.build_url("conn").await;
        handle_string_response(self.client.get(&url).send().await).await
    }

    /// Check the configured credentials are accepted.
    pub async fn check_auth(&self) -> Result<String, UploaderClientError> {
        let url = self.build_url("auth").await;
        let request = self.apply_auth(self.client.get(&url)).await;
        handle_string_response(request.send().await).await
    }

    /// Upload one song's bytes in a single request.
    pub async fn send_song(
        &self,
        data: Vec<u8>,
        artist: &str,
        album: &str,
        song_file_name: &str,
    ) -> Result<String, UploaderClientError> {
        let url = self.build_url("upload").await;
        let hash = hex_sha256(&data);
        debug!(
            "Sending {} ({} bytes, sha256 {}) to {}",
            song_file_name,
            data.len(),
            hash,
            url
        );
        let request = self
            .client
            .post(&url)
            .header("file", song_file_name)
            .header("album", album)
            .header("artist", artist)
            .header("hash", hash)
            .body(data);
        let request = self.apply_auth(request).await;
        handle_string_response(request.send().await).await
    }

    /// Declare a song that is about to be sent in parts.
    pub async fn declare_upload(
        &self,
        request: &DeclareUploadRequest,
    ) -> Result<DeclareUploadResponse, UploaderClientError> {
        let url = self.build_url("declareupload").await;
        let request = self.apply_auth(self.client.post(&url).json(request)).await;
        let body = handle_string_response(request.send().await).await?;
        serde_json::from_str(&body).map_err(|e| UploaderClientError::ParseResponse(e.to_string()))
    }

    /// Send one part of a declared upload.
    pub async fn upload_part(
        &self,
        key: &str,
        index: u8,
        data: Vec<u8>,
    ) -> Result<String, UploaderClientError> {
        let url = self.build_url("uploadpart").await;
        let request = self
            .client
            .post(&url)
            .header("key", key)
            .header("index", index.to_string())
            .body(data);
        let request = self.apply_auth(request).await;
        handle_string_response(request.send().await).await
    }

    /// Part size requested in declarations, from the shared settings.
    async fn part_size_bytes(&self) -> u32 {
        let settings = self.settings.read().await;
        settings.max_part_size_mb.saturating_mul(MEGABYTE_BYTES)
    }

    /// Ask the server to rescan its library.
    pub async fn trigger_scan(&self) -> Result<String, UploaderClientError> {
        let url = self.build_url("triggerscan").await;
        let request = self.apply_auth(self.client.post(&url)).await;
        handle_string_response(request.send().await).await
    }
}

#[async_trait]
impl SongUploader for MusicUploaderClient {
    async fn upload_song(&self, album: &AlbumMetadata, song: &SongRef) -> anyhow::Result<String> {
        let data = tokio::fs::read(&song.path)
            .await
            .map_err(|e| UploaderClientError::FileRead(song.path.clone(), e))?;
        if data.len() > MULTIPART_THRESHOLD_BYTES {
            let part_size = self.part_size_bytes().await;
            return Ok(upload_in_parts(self, album, &song.song_name, &data, part_size).await?);
        }
        Ok(self
            .send_song(data, &album.artist, &album.name, &song.song_name)
            .await?)
    }

    async fn trigger_scan(&self) -> anyhow::Result<String> {
        Ok(MusicUploaderClient::trigger_scan(self).await?)
    }
}

#[async_trait]
impl PartTransport for MusicUploaderClient {
    async fn declare_upload(
        &self,
        request: DeclareUploadRequest,
    ) -> Result<DeclareUploadResponse, UploaderClientError> {
        MusicUploaderClient::declare_upload(self, &request).await
    }

    async fn upload_part(
        &self,
        key: &str,
        index: u8,
        data: Vec<u8>,
    ) -> Result<String, UploaderClientError> {
        MusicUploaderClient::upload_part(self, key, index, data).await
    }
}

/// Check connection and credentials, reporting both to the user log.
pub async fn run_settings_checks(
    client: &MusicUploaderClient,
    handle: &UploaderHandle,
) -> UploaderResult<bool> {
    let (user, server_url) = {
        let settings = client.settings.read().await;
        (settings.user.clone(), settings.server_url.clone())
    };
    let conn_ok = match client.check_conn().await {
        Ok(_) => {
            handle.log("Connection is good").await?;
            true
        }
        Err(e) => {
            handle
                .log(format!("Cannot connect with {}: {}", server_url, e))
                .await?;
            false
        }
    };
    let auth_ok = match client.check_auth().await {
        Ok(_) => {
            handle
                .log(format!("Authentication valid: hello {}", user))
                .await?;
            true
        }
        Err(e) => {
            handle
                .log(format!("Authentication unsuccessful: {}", e))
                .await?;
            false
        }
    };
    handle.log("Settings checks complete").await?;
    Ok(conn_ok && auth_ok)
}

pub fn hex_sha256(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

async fn handle_string_response(
    result: Result<Response, reqwest::Error>,
) -> Result<String, UploaderClientError> {
    match result {
        Ok(response) => {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            if status.is_success() {
                Ok(body)
            } else {
                Err(UploaderClientError::UnhappyResponse(status.as_u16(), body))
            }
        }
        Err(e) => {
            warn!("Request to uploader server failed: {}", e);
            Err(UploaderClientError::Request(e.to_string()))
        }
    }
}
