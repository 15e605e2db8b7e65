//! A backend that plays out album uploads from a script.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use music_uploader::uploader::{AlbumMetadata, FileId, SongRef, UploadEvent, UploaderBackend};
use tokio::sync::{mpsc, Semaphore};

/// Emits the same push events a real backend would, in the same order,
/// before its upload call returns.
///
/// Songs whose path is in `failing_paths` are reported as failed. When the
/// backend is gated, each album upload stops after `album_is_uploading` until
/// [`ScriptedBackend::release`] is called.
pub struct ScriptedBackend {
    events: mpsc::Sender<UploadEvent>,
    extensions: Vec<String>,
    failing_paths: Mutex<HashSet<String>>,
    gate: Option<Semaphore>,
    next_id: AtomicUsize,
    calls: Mutex<Vec<AlbumMetadata>>,
}

impl ScriptedBackend {
    pub fn new(events: mpsc::Sender<UploadEvent>, extensions: &[&str], gated: bool) -> Self {
        Self {
            events,
            extensions: extensions.iter().map(|s| s.to_string()).collect(),
            failing_paths: Mutex::new(HashSet::new()),
            gate: gated.then(|| Semaphore::new(0)),
            next_id: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_path(&self, path: &str) {
        self.failing_paths.lock().unwrap().insert(path.to_string());
    }

    /// Let one held album upload continue.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Albums handed to the backend, in call order.
    pub fn calls(&self) -> Vec<AlbumMetadata> {
        self.calls.lock().unwrap().clone()
    }

    async fn emit(&self, event: UploadEvent) {
        let _ = self.events.send(event).await;
    }
}

#[async_trait]
impl UploaderBackend for ScriptedBackend {
    async fn generate_id(&self) -> Result<FileId> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(FileId(format!("file-{}", n)))
    }

    async fn allowed_extensions(&self) -> Result<Vec<String>> {
        Ok(self.extensions.clone())
    }

    async fn upload_album(&self, album: AlbumMetadata, songs: Vec<SongRef>) -> Result<String> {
        self.calls.lock().unwrap().push(album.clone());
        self.emit(UploadEvent::AlbumIsUploading { album_id: album.id })
            .await;

        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }

        let mut all_succeeded = true;
        for song in songs {
            self.emit(UploadEvent::FileIsUploading {
                album_id: album.id,
                file: song.path.clone(),
            })
            .await;
            let success = !self.failing_paths.lock().unwrap().contains(&song.path);
            all_succeeded &= success;
            self.emit(UploadEvent::FileReport {
                album_id: album.id,
                file: song.path.clone(),
                success,
                message: format!(
                    "{} {}",
                    song.song_name,
                    if success { "uploaded" } else { "failed" }
                ),
            })
            .await;
        }

        self.emit(UploadEvent::AlbumReport {
            album_id: album.id,
            success: all_succeeded,
            message: if all_succeeded {
                format!("{} uploaded", album.name)
            } else {
                format!("{} failed", album.name)
            },
        })
        .await;
        Ok(format!("upload call for {} returned", album.name))
    }
}
