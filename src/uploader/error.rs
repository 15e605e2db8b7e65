use std::fmt;

use thiserror::Error;

use super::models::AlbumId;

/// A reason an album can't be queued for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
    NoFiles,
    MissingName,
    MissingArtist,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::NoFiles => write!(f, "you must select files to upload"),
            ValidationIssue::MissingName => write!(f, "you must provide an album name"),
            ValidationIssue::MissingArtist => write!(f, "you must provide an artist"),
        }
    }
}

/// Errors returned by registry, dispatcher and session operations.
///
/// None of these are fatal: the operation is aborted and state is left as it was.
#[derive(Debug, Error)]
pub enum UploaderError {
    #[error("Album {0} does not exist")]
    AlbumNotFound(AlbumId),

    #[error("Album {0} is queued or uploading")]
    AlbumBusy(AlbumId),

    #[error("Cannot upload album: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("Skipping {0} because it does not have a valid extension")]
    DisallowedExtension(String),

    #[error("Skipping {0} because it is already listed")]
    DuplicatePath(String),

    #[error("File {path} is not part of album {album_id}")]
    FileNotFound { album_id: AlbumId, path: String },

    #[error("Backend error: {0}")]
    Backend(#[from] anyhow::Error),

    #[error("Uploader session is closed")]
    SessionClosed,
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type UploaderResult<T> = Result<T, UploaderError>;
