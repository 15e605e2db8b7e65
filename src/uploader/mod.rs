//! Album uploader
//!
//! Manages a user-editable set of album upload jobs and submits them one at a
//! time to a backend, folding the backend's pushed progress events back into
//! album and file state.

mod album_upload;
mod backend;
mod client;
mod dispatcher;
mod error;
mod events;
mod extension_filter;
mod handle;
mod message_log;
mod models;
mod multipart;
mod registry;
mod session;
mod snapshot;

pub use album_upload::{
    AlbumUploadBackend, SongUploader, ALBUM_FAILURE_MESSAGE, ALBUM_SUCCESS_MESSAGE,
};
#[cfg(any(test, feature = "mock"))]
pub use album_upload::MockSongUploader;
pub use backend::UploaderBackend;
#[cfg(any(test, feature = "mock"))]
pub use backend::MockUploaderBackend;
pub use client::{hex_sha256, run_settings_checks, MusicUploaderClient, UploaderClientError};
pub use dispatcher::{validate_album, DispatchJob, UploadDispatcher};
pub use error::{UploaderError, UploaderResult, ValidationIssue};
pub use events::{channels, reconcile, UploadEvent};
pub use extension_filter::{extension, file_name, normalize_extension, ExtensionFilter};
pub use handle::{UploaderCommand, UploaderHandle};
pub use message_log::{LogMessage, MessageLog};
pub use models::*;
pub use multipart::{
    num_parts, part_range, upload_in_parts, DeclareUploadRequest, DeclareUploadResponse,
    PartTransport, MAX_MULTIPART_UPLOAD_ATTEMPTS, MEGABYTE_BYTES, MULTIPART_THRESHOLD_BYTES,
};
#[cfg(any(test, feature = "mock"))]
pub use multipart::MockPartTransport;
pub use registry::{AdmissionReport, AlbumRegistry};
pub use session::{create_session, SessionConfig, UploaderSession};
pub use snapshot::{LogLine, UploaderSnapshot};
