//! Backend capability surface consumed by the uploader session.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{AlbumMetadata, FileId, SongRef};

/// What the session needs from the outside world.
///
/// Progress and results of an upload are not returned from `upload_album`;
/// they arrive as [`UploadEvent`](super::events::UploadEvent)s on the
/// session's push channel.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait UploaderBackend: Send + Sync {
    /// Produce a fresh unique file identifier.
    async fn generate_id(&self) -> Result<FileId>;

    /// Current admissible file extensions.
    async fn allowed_extensions(&self) -> Result<Vec<String>>;

    /// Transfer a whole album. The returned text is only logged.
    async fn upload_album(&self, album: AlbumMetadata, songs: Vec<SongRef>) -> Result<String>;
}
