//! Album upload backend that reports progress as push events.
//!
//! Uploads the songs of an album one by one through a [`SongUploader`],
//! emitting `album_is_uploading`, `file_is_uploading`, `file_report` and a
//! final `album_report` on the session's push channel.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::UploaderSettings;

use super::backend::UploaderBackend;
use super::events::UploadEvent;
use super::models::{AlbumMetadata, FileId, SongRef};

pub const ALBUM_SUCCESS_MESSAGE: &str = "All files in album uploaded successfully";
pub const ALBUM_FAILURE_MESSAGE: &str = "At least one song failed to upload";

/// Transfers a single song to the remote server.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait SongUploader: Send + Sync {
    async fn upload_song(&self, album: &AlbumMetadata, song: &SongRef) -> Result<String>;

    /// Ask the server to pick up newly uploaded files.
    async fn trigger_scan(&self) -> Result<String>;
}

pub struct AlbumUploadBackend {
    uploader: Arc<dyn SongUploader>,
    settings: Arc<RwLock<UploaderSettings>>,
    events: mpsc::Sender<UploadEvent>,
    trigger_scan: bool,
}

impl AlbumUploadBackend {
    pub fn new(
        uploader: Arc<dyn SongUploader>,
        settings: Arc<RwLock<UploaderSettings>>,
        events: mpsc::Sender<UploadEvent>,
        trigger_scan: bool,
    ) -> Self {
        Self {
            uploader,
            settings,
            events,
            trigger_scan,
        }
    }

    async fn emit(&self, event: UploadEvent) {
        if self.events.send(event).await.is_err() {
            warn!("Push event channel closed, dropping event");
        }
    }

    async fn log(&self, message: impl Into<String>) {
        self.emit(UploadEvent::Log {
            message: message.into(),
        })
        .await;
    }
}

#[async_trait]
impl UploaderBackend for AlbumUploadBackend {
    async fn generate_id(&self) -> Result<FileId> {
        Ok(FileId(Uuid::new_v4().to_string()))
    }

    async fn allowed_extensions(&self) -> Result<Vec<String>> {
        Ok(self.settings.read().await.valid_extensions.clone())
    }

    async fn upload_album(&self, album: AlbumMetadata, songs: Vec<SongRef>) -> Result<String> {
        info!(
            "Uploading album {} ({} - {}) with {} songs",
            album.id,
            album.artist,
            album.name,
            songs.len()
        );
        self.log("backend received album upload request").await;
        self.emit(UploadEvent::AlbumIsUploading { album_id: album.id })
            .await;

        let mut all_succeeded = true;
        for song in &songs {
            self.emit(UploadEvent::FileIsUploading {
                album_id: album.id,
                file: song.path.clone(),
            })
            .await;
            let result = self.uploader.upload_song(&album, song).await;
            let (success, message) = match result {
                Ok(message) => (true, message),
                Err(e) => {
                    warn!("Failed to upload {}: {:#}", song.path, e);
                    all_succeeded = false;
                    (false, format!("{}: {:#}", song.song_name, e))
                }
            };
            self.emit(UploadEvent::FileReport {
                album_id: album.id,
                file: song.path.clone(),
                success,
                message,
            })
            .await;
        }

        let message = if all_succeeded {
            ALBUM_SUCCESS_MESSAGE
        } else {
            ALBUM_FAILURE_MESSAGE
        };
        self.emit(UploadEvent::AlbumReport {
            album_id: album.id,
            success: all_succeeded,
            message: message.to_string(),
        })
        .await;

        if !all_succeeded {
            return Err(anyhow!("Album {}: {}", album.id, ALBUM_FAILURE_MESSAGE));
        }

        if self.trigger_scan {
            let scan = self.uploader.trigger_scan().await?;
            info!("Triggered library scan: {}", scan);
        }
        Ok(format!("Album {}: {}", album.id, ALBUM_SUCCESS_MESSAGE))
    }
}
