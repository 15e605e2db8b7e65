//! Data models for the album uploader.
//!
//! Defines albums, queued files, their state machines, and the reduced song
//! view handed to the backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an album in the registry.
///
/// Allocated from a monotonically increasing counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlbumId(pub u64);

impl AlbumId {
    /// Parse the string form carried by push event payloads.
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().trim_matches('"').parse::<u64>().ok().map(AlbumId)
    }
}

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque unique identifier of a file entry (UUID string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upload state of a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    NotUploaded,
    Uploading,
    Uploaded,     // terminal
    FailedUpload, // terminal
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::NotUploaded => "NOT_UPLOADED",
            FileState::Uploading => "UPLOADING",
            FileState::Uploaded => "UPLOADED",
            FileState::FailedUpload => "FAILED_UPLOAD",
        }
    }

    /// Short glyph used when rendering file lists in a terminal.
    pub fn symbol(&self) -> &'static str {
        match self {
            FileState::NotUploaded => "[ ]",
            FileState::Uploading => "[~]",
            FileState::Uploaded => "[+]",
            FileState::FailedUpload => "[x]",
        }
    }
}

/// Lifecycle state of an album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlbumState {
    Selecting,
    InQueue,
    Uploading,
    UploadSuccess, // terminal
    UploadFail,    // terminal
}

impl AlbumState {
    /// Returns true while the album is queued or in flight.
    ///
    /// Busy albums can't be closed, edited or queued again.
    pub fn is_busy(&self) -> bool {
        matches!(self, AlbumState::InQueue | AlbumState::Uploading)
    }

    /// Returns true if this is a terminal state (UploadSuccess or UploadFail).
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlbumState::UploadSuccess | AlbumState::UploadFail)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumState::Selecting => "SELECTING",
            AlbumState::InQueue => "IN_QUEUE",
            AlbumState::Uploading => "UPLOADING",
            AlbumState::UploadSuccess => "UPLOAD_SUCCESS",
            AlbumState::UploadFail => "UPLOAD_FAIL",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            AlbumState::Selecting => "( )",
            AlbumState::InQueue => "(z)",
            AlbumState::Uploading => "(~)",
            AlbumState::UploadSuccess => "(+)",
            AlbumState::UploadFail => "(x)",
        }
    }
}

impl fmt::Display for AlbumState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file queued for upload within an album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Unique identifier, assigned at admission
    pub id: FileId,
    /// Display name (last path segment)
    pub name: String,
    /// Source location, unique within the owning album
    pub path: String,
    pub state: FileState,
}

impl FileEntry {
    /// Create a file entry in the `NotUploaded` state.
    pub fn new(id: FileId, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id,
            name: super::extension_filter::file_name(&path).to_string(),
            path,
            state: FileState::NotUploaded,
        }
    }

    /// Reduce to the `{name, path}` pair the backend needs.
    pub fn to_song(&self) -> SongRef {
        SongRef {
            song_name: self.name.clone(),
            path: self.path.clone(),
        }
    }
}

/// A named upload job grouping files under shared album/artist metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumEntry {
    pub id: AlbumId,
    pub name: String,
    pub artist: String,
    /// Insertion ordered
    pub files: Vec<FileEntry>,
    pub state: AlbumState,
}

impl AlbumEntry {
    /// Create an empty album in the `Selecting` state.
    pub fn new(id: AlbumId) -> Self {
        Self {
            id,
            name: String::new(),
            artist: String::new(),
            files: Vec::new(),
            state: AlbumState::Selecting,
        }
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path == path)
    }

    pub fn file_mut(&mut self, path: &str) -> Option<&mut FileEntry> {
        self.files.iter_mut().find(|f| f.path == path)
    }

    pub fn metadata(&self) -> AlbumMetadata {
        AlbumMetadata {
            id: self.id,
            name: self.name.clone(),
            artist: self.artist.clone(),
        }
    }

    pub fn songs(&self) -> Vec<SongRef> {
        self.files.iter().map(FileEntry::to_song).collect()
    }
}

/// Album metadata sent along with an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumMetadata {
    pub id: AlbumId,
    pub name: String,
    pub artist: String,
}

/// A file reduced to what the backend needs to transfer it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRef {
    pub song_name: String,
    pub path: String,
}
