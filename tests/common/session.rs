//! Test session that runs the real session loop on the test runtime.

#![allow(dead_code)]

use std::sync::Arc;

use music_uploader::uploader::{create_session, SessionConfig, UploadEvent};
use music_uploader::{AlbumId, UploaderHandle, UploaderSnapshot};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::backend::ScriptedBackend;
use super::constants::{ALLOWED_EXTENSIONS, WAIT_TIMEOUT};

/// A running session plus the pieces tests poke at directly.
///
/// The session is cancelled on drop.
pub struct TestSession {
    pub handle: UploaderHandle,
    pub backend: Arc<ScriptedBackend>,
    /// Sender for injecting push events the backend never produced
    pub events: mpsc::Sender<UploadEvent>,
    shutdown_token: CancellationToken,
}

impl TestSession {
    pub async fn spawn() -> Self {
        Self::spawn_with(false).await
    }

    /// Spawn a session whose backend holds every upload until released.
    pub async fn spawn_gated() -> Self {
        Self::spawn_with(true).await
    }

    async fn spawn_with(gated: bool) -> Self {
        let (events, event_rx) = mpsc::channel(64);
        let backend = Arc::new(ScriptedBackend::new(
            events.clone(),
            ALLOWED_EXTENSIONS,
            gated,
        ));
        let shutdown_token = CancellationToken::new();
        let (session, handle) = create_session(
            backend.clone(),
            event_rx,
            shutdown_token.clone(),
            SessionConfig::default(),
        );
        tokio::spawn(session.run());

        Self {
            handle,
            backend,
            events,
            shutdown_token,
        }
    }

    /// Fill in the selected album. Returns its id.
    pub async fn prepare_album(&self, name: &str, artist: &str, files: &[&str]) -> AlbumId {
        let id = self.handle.snapshot().selected_album_id;
        self.handle.set_album_name(name).await.unwrap();
        self.handle.set_album_artist(artist).await.unwrap();
        self.handle
            .add_files(files.iter().map(|s| s.to_string()).collect())
            .await
            .unwrap();
        id
    }

    /// Create and select a new album, then fill it in.
    pub async fn prepare_new_album(&self, name: &str, artist: &str, files: &[&str]) -> AlbumId {
        self.handle.create_and_select_album().await.unwrap();
        self.prepare_album(name, artist, files).await
    }

    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&UploaderSnapshot) -> bool,
    ) -> UploaderSnapshot {
        tokio::time::timeout(WAIT_TIMEOUT, self.handle.wait_for(predicate))
            .await
            .expect("timed out waiting for session state")
            .expect("session closed")
    }

    pub async fn wait_until_idle(&self) -> UploaderSnapshot {
        self.wait_for(UploaderSnapshot::is_idle).await
    }
}

impl Drop for TestSession {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}
