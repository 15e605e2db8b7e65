use tokio::sync::{mpsc, oneshot, watch};

use super::error::{UploaderError, UploaderResult};
use super::models::AlbumId;
use super::registry::AdmissionReport;
use super::snapshot::UploaderSnapshot;

/// Command sent to the uploader session.
pub enum UploaderCommand {
    CreateAndSelectAlbum {
        response: oneshot::Sender<AlbumId>,
    },
    SetAlbumName {
        name: String,
        response: oneshot::Sender<UploaderResult<()>>,
    },
    SetAlbumArtist {
        artist: String,
        response: oneshot::Sender<UploaderResult<()>>,
    },
    SelectAlbum {
        album_id: AlbumId,
        response: oneshot::Sender<UploaderResult<()>>,
    },
    CloseAlbum {
        album_id: AlbumId,
        response: oneshot::Sender<UploaderResult<()>>,
    },
    /// Admit files into the album selected when the command is received.
    AddFiles {
        paths: Vec<String>,
        response: oneshot::Sender<UploaderResult<AdmissionReport>>,
    },
    RequestUpload {
        album_id: AlbumId,
        response: oneshot::Sender<UploaderResult<()>>,
    },
    AppendLog {
        text: String,
        response: oneshot::Sender<()>,
    },
    ClearLog {
        response: oneshot::Sender<()>,
    },
}

/// Handle to interact with the uploader session from the presentation layer.
///
/// Cheap to clone. Every mutation is applied by the session loop; reads go
/// through the latest published snapshot.
#[derive(Clone)]
pub struct UploaderHandle {
    /// Channel to send commands to the session
    command_tx: mpsc::Sender<UploaderCommand>,
    /// Latest state published by the session
    snapshot_rx: watch::Receiver<UploaderSnapshot>,
}

impl UploaderHandle {
    pub fn new(
        command_tx: mpsc::Sender<UploaderCommand>,
        snapshot_rx: watch::Receiver<UploaderSnapshot>,
    ) -> Self {
        Self {
            command_tx,
            snapshot_rx,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> UploaderCommand,
    ) -> UploaderResult<T> {
        let (response, rx) = oneshot::channel();
        self.command_tx
            .send(build(response))
            .await
            .map_err(|_| UploaderError::SessionClosed)?;
        rx.await.map_err(|_| UploaderError::SessionClosed)
    }

    pub async fn create_and_select_album(&self) -> UploaderResult<AlbumId> {
        self.request(|response| UploaderCommand::CreateAndSelectAlbum { response })
            .await
    }

    pub async fn set_album_name(&self, name: impl Into<String>) -> UploaderResult<()> {
        let name = name.into();
        self.request(|response| UploaderCommand::SetAlbumName { name, response })
            .await?
    }

    pub async fn set_album_artist(&self, artist: impl Into<String>) -> UploaderResult<()> {
        let artist = artist.into();
        self.request(|response| UploaderCommand::SetAlbumArtist { artist, response })
            .await?
    }

    pub async fn select_album(&self, album_id: AlbumId) -> UploaderResult<()> {
        self.request(|response| UploaderCommand::SelectAlbum { album_id, response })
            .await?
    }

    pub async fn close_album(&self, album_id: AlbumId) -> UploaderResult<()> {
        self.request(|response| UploaderCommand::CloseAlbum { album_id, response })
            .await?
    }

    /// Admit `paths` into the currently selected album.
    ///
    /// Resolves once the batch has been filtered and appended. Per-file
    /// rejections are listed in the report, not returned as errors.
    pub async fn add_files(&self, paths: Vec<String>) -> UploaderResult<AdmissionReport> {
        self.request(|response| UploaderCommand::AddFiles { paths, response })
            .await?
    }

    pub async fn request_upload(&self, album_id: AlbumId) -> UploaderResult<()> {
        self.request(|response| UploaderCommand::RequestUpload { album_id, response })
            .await?
    }

    /// Append a line to the user log.
    pub async fn log(&self, text: impl Into<String>) -> UploaderResult<()> {
        let text = text.into();
        self.request(|response| UploaderCommand::AppendLog { text, response })
            .await
    }

    pub async fn clear_log(&self) -> UploaderResult<()> {
        self.request(|response| UploaderCommand::ClearLog { response })
            .await
    }

    /// The latest published state.
    pub fn snapshot(&self) -> UploaderSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// A receiver notified on every published state change.
    pub fn subscribe(&self) -> watch::Receiver<UploaderSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Wait until a published state satisfies `predicate`.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&UploaderSnapshot) -> bool,
    ) -> UploaderResult<UploaderSnapshot> {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| UploaderError::SessionClosed)?;
        Ok(snapshot.clone())
    }

    /// Wait until nothing is queued and no upload is in flight.
    pub async fn wait_until_idle(&self) -> UploaderResult<UploaderSnapshot> {
        self.wait_for(UploaderSnapshot::is_idle).await
    }
}
