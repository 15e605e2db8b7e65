//! Music Uploader Library
//!
//! Client-side orchestration of album uploads: the album registry, the
//! one-at-a-time upload dispatcher and reconciliation of backend push events.

pub mod config;
pub mod uploader;

// Re-export commonly used types for convenience
pub use config::{AppConfig, CliConfig, FileConfig, UploaderSettings};
pub use uploader::{
    create_session, AlbumId, AlbumState, FileState, UploadEvent, UploaderBackend,
    UploaderError, UploaderHandle, UploaderSession, UploaderSnapshot,
};
