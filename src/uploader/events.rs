//! Push events from the backend and their reconciliation into the registry.
//!
//! Events arrive in no guaranteed order relative to each other or to the
//! dispatcher's own bookkeeping. An event naming an album or file that no
//! longer exists is dropped with a log line.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use super::error::UploaderError;
use super::models::{AlbumId, AlbumState, FileState};
use super::registry::AlbumRegistry;

/// Channel names used on the inbound push channel.
pub mod channels {
    /// Payload: the album id as a bare string.
    pub const ALBUM_IS_UPLOADING: &str = "music_uploader://album_is_uploading";
    /// Payload: `{album_id, file}`.
    pub const FILE_IS_UPLOADING: &str = "music_uploader://file_is_uploading";
    /// Payload: `{album_id, file, success, message}`.
    pub const FILE_REPORT: &str = "music_uploader://file_report";
    /// Payload: `{album_id, success, message}`.
    pub const ALBUM_REPORT: &str = "music_uploader://album_report";
    /// Payload: free text for the user log.
    pub const LOG: &str = "music_uploader://log";
}

/// A backend-originated notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    AlbumIsUploading {
        album_id: AlbumId,
    },
    FileIsUploading {
        album_id: AlbumId,
        file: String,
    },
    FileReport {
        album_id: AlbumId,
        file: String,
        success: bool,
        message: String,
    },
    AlbumReport {
        album_id: AlbumId,
        success: bool,
        message: String,
    },
    Log {
        message: String,
    },
}

#[derive(Deserialize)]
struct FileIsUploadingPayload {
    album_id: String,
    file: String,
}

#[derive(Deserialize)]
struct FileReportPayload {
    album_id: String,
    file: String,
    success: bool,
    message: String,
}

#[derive(Deserialize)]
struct AlbumReportPayload {
    album_id: String,
    success: bool,
    message: String,
}

fn parse_album_id(raw: &str) -> Result<AlbumId> {
    AlbumId::parse(raw).ok_or_else(|| anyhow!("Invalid album id in push event: {:?}", raw))
}

impl UploadEvent {
    /// Decode an event received on `channel` with a JSON (or bare) payload.
    pub fn decode(channel: &str, payload: &str) -> Result<Self> {
        match channel {
            channels::ALBUM_IS_UPLOADING => Ok(UploadEvent::AlbumIsUploading {
                album_id: parse_album_id(payload)?,
            }),
            channels::FILE_IS_UPLOADING => {
                let p: FileIsUploadingPayload = serde_json::from_str(payload)
                    .context("Failed to parse file_is_uploading payload")?;
                Ok(UploadEvent::FileIsUploading {
                    album_id: parse_album_id(&p.album_id)?,
                    file: p.file,
                })
            }
            channels::FILE_REPORT => {
                let p: FileReportPayload = serde_json::from_str(payload)
                    .context("Failed to parse file_report payload")?;
                Ok(UploadEvent::FileReport {
                    album_id: parse_album_id(&p.album_id)?,
                    file: p.file,
                    success: p.success,
                    message: p.message,
                })
            }
            channels::ALBUM_REPORT => {
                let p: AlbumReportPayload = serde_json::from_str(payload)
                    .context("Failed to parse album_report payload")?;
                Ok(UploadEvent::AlbumReport {
                    album_id: parse_album_id(&p.album_id)?,
                    success: p.success,
                    message: p.message,
                })
            }
            channels::LOG => Ok(UploadEvent::Log {
                message: payload.to_string(),
            }),
            other => Err(anyhow!("Unknown push event channel: {}", other)),
        }
    }

    /// The album this event targets, if any.
    pub fn album_id(&self) -> Option<AlbumId> {
        match self {
            UploadEvent::AlbumIsUploading { album_id }
            | UploadEvent::FileIsUploading { album_id, .. }
            | UploadEvent::FileReport { album_id, .. }
            | UploadEvent::AlbumReport { album_id, .. } => Some(*album_id),
            UploadEvent::Log { .. } => None,
        }
    }
}

/// Fold one push event into the registry.
///
/// Returns the text to surface in the user log, if the event carries one.
/// Reports surface their message whether or not the target still exists.
pub fn reconcile(registry: &mut AlbumRegistry, event: UploadEvent) -> Option<String> {
    let (result, message) = match event {
        UploadEvent::AlbumIsUploading { album_id } => {
            if let Some(other) = registry.uploading_album().filter(|id| *id != album_id) {
                warn!(
                    "Album {} reported uploading while album {} still is",
                    album_id, other
                );
            }
            (
                registry.set_album_state(album_id, AlbumState::Uploading),
                None,
            )
        }
        UploadEvent::FileIsUploading { album_id, file } => (
            registry.set_file_state(album_id, &file, FileState::Uploading),
            None,
        ),
        UploadEvent::FileReport {
            album_id,
            file,
            success,
            message,
        } => {
            let state = if success {
                FileState::Uploaded
            } else {
                FileState::FailedUpload
            };
            (
                registry.set_file_state(album_id, &file, state),
                Some(message),
            )
        }
        UploadEvent::AlbumReport {
            album_id,
            success,
            message,
        } => {
            let state = if success {
                AlbumState::UploadSuccess
            } else {
                AlbumState::UploadFail
            };
            (registry.set_album_state(album_id, state), Some(message))
        }
        UploadEvent::Log { message } => (Ok(()), Some(message)),
    };

    match result {
        Ok(()) => {}
        Err(e @ (UploaderError::AlbumNotFound(_) | UploaderError::FileNotFound { .. })) => {
            debug!("Ignoring push event for a closed target: {}", e);
        }
        Err(e) => warn!("Failed to apply push event: {}", e),
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploader::extension_filter::ExtensionFilter;
    use crate::uploader::models::FileId;

    fn registry_with_album(files: &[&str]) -> (AlbumRegistry, AlbumId) {
        let mut registry = AlbumRegistry::new();
        let id = registry.selected_id();
        let filter = ExtensionFilter::new(["mp3"]);
        let files: Vec<String> = files.iter().map(|s| s.to_string()).collect();
        let mut n = 0;
        registry
            .add_files(id, &files, &filter, || {
                n += 1;
                FileId(n.to_string())
            })
            .unwrap();
        (registry, id)
    }

    #[test]
    fn test_decode_album_is_uploading_bare_and_quoted() {
        assert_eq!(
            UploadEvent::decode(channels::ALBUM_IS_UPLOADING, "3").unwrap(),
            UploadEvent::AlbumIsUploading {
                album_id: AlbumId(3)
            }
        );
        assert_eq!(
            UploadEvent::decode(channels::ALBUM_IS_UPLOADING, "\"4\"").unwrap(),
            UploadEvent::AlbumIsUploading {
                album_id: AlbumId(4)
            }
        );
    }

    #[test]
    fn test_decode_file_report() {
        let payload = r#"{"album_id":"2","file":"/m/a.mp3","success":false,"message":"boom"}"#;
        let event = UploadEvent::decode(channels::FILE_REPORT, payload).unwrap();
        assert_eq!(
            event,
            UploadEvent::FileReport {
                album_id: AlbumId(2),
                file: "/m/a.mp3".to_string(),
                success: false,
                message: "boom".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_channel_and_bad_ids() {
        assert!(UploadEvent::decode("music_uploader://nope", "{}").is_err());
        assert!(UploadEvent::decode(channels::ALBUM_IS_UPLOADING, "abc").is_err());
        assert!(UploadEvent::decode(channels::ALBUM_REPORT, "not json").is_err());
    }

    #[test]
    fn test_full_progress_sequence() {
        let (mut registry, id) = registry_with_album(&["/m/a.mp3", "/m/b.mp3"]);

        reconcile(&mut registry, UploadEvent::AlbumIsUploading { album_id: id });
        reconcile(
            &mut registry,
            UploadEvent::FileIsUploading {
                album_id: id,
                file: "/m/a.mp3".to_string(),
            },
        );
        assert_eq!(registry.get(id).unwrap().files[0].state, FileState::Uploading);

        let msg = reconcile(
            &mut registry,
            UploadEvent::FileReport {
                album_id: id,
                file: "/m/a.mp3".to_string(),
                success: true,
                message: "ok a".to_string(),
            },
        );
        assert_eq!(msg.as_deref(), Some("ok a"));
        reconcile(
            &mut registry,
            UploadEvent::FileReport {
                album_id: id,
                file: "/m/b.mp3".to_string(),
                success: false,
                message: "bad b".to_string(),
            },
        );
        reconcile(
            &mut registry,
            UploadEvent::AlbumReport {
                album_id: id,
                success: false,
                message: "At least one song failed to upload".to_string(),
            },
        );

        let album = registry.get(id).unwrap();
        assert_eq!(album.files[0].state, FileState::Uploaded);
        assert_eq!(album.files[1].state, FileState::FailedUpload);
        assert_eq!(album.state, AlbumState::UploadFail);
    }

    #[test]
    fn test_events_for_closed_album_are_ignored() {
        let (mut registry, id) = registry_with_album(&["/m/a.mp3"]);
        let other = registry.create_and_select_album();
        registry.close_album(id).unwrap();

        let msg = reconcile(
            &mut registry,
            UploadEvent::FileReport {
                album_id: id,
                file: "/m/a.mp3".to_string(),
                success: true,
                message: "late".to_string(),
            },
        );
        reconcile(&mut registry, UploadEvent::AlbumIsUploading { album_id: id });

        assert_eq!(msg.as_deref(), Some("late"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(other).unwrap().state, AlbumState::Selecting);
    }

    #[test]
    fn test_log_event_only_surfaces_text() {
        let (mut registry, id) = registry_with_album(&[]);
        let msg = reconcile(
            &mut registry,
            UploadEvent::Log {
                message: "hello".to_string(),
            },
        );
        assert_eq!(msg.as_deref(), Some("hello"));
        assert_eq!(registry.get(id).unwrap().state, AlbumState::Selecting);
    }
}
