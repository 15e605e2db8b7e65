//! Read-only projection of the session state for presentation.

use serde::Serialize;

use super::dispatcher::UploadDispatcher;
use super::message_log::MessageLog;
use super::models::{AlbumEntry, AlbumId, AlbumState, FileEntry};
use super::registry::AlbumRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub text: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploaderSnapshot {
    pub selected_album_id: AlbumId,
    /// Every album, in id order (tab order)
    pub albums: Vec<AlbumEntry>,
    /// Album ids waiting for dispatch, head first
    pub queue: Vec<AlbumId>,
    /// True while an album upload call is in flight
    pub busy: bool,
    /// User log, newest first
    pub messages: Vec<LogLine>,
}

impl UploaderSnapshot {
    pub fn capture(registry: &AlbumRegistry, dispatcher: &UploadDispatcher, log: &MessageLog) -> Self {
        Self {
            selected_album_id: registry.selected_id(),
            albums: registry.albums().cloned().collect(),
            queue: dispatcher.queued().collect(),
            busy: dispatcher.is_busy(),
            messages: log
                .messages()
                .map(|m| LogLine {
                    text: m.text.clone(),
                    time: m.display_time(),
                })
                .collect(),
        }
    }

    pub fn album(&self, id: AlbumId) -> Option<&AlbumEntry> {
        self.albums.iter().find(|a| a.id == id)
    }

    pub fn selected(&self) -> Option<&AlbumEntry> {
        self.album(self.selected_album_id)
    }

    pub fn selected_name(&self) -> &str {
        self.selected().map(|a| a.name.as_str()).unwrap_or("")
    }

    pub fn selected_artist(&self) -> &str {
        self.selected().map(|a| a.artist.as_str()).unwrap_or("")
    }

    pub fn selected_files(&self) -> &[FileEntry] {
        self.selected().map(|a| a.files.as_slice()).unwrap_or(&[])
    }

    pub fn selected_state(&self) -> AlbumState {
        self.selected()
            .map(|a| a.state)
            .unwrap_or(AlbumState::UploadFail)
    }

    /// Nothing queued and nothing in flight.
    pub fn is_idle(&self) -> bool {
        !self.busy && self.queue.is_empty()
    }

    pub fn has_message(&self, text: &str) -> bool {
        self.messages.iter().any(|m| m.text.contains(text))
    }
}
