//! Upload dispatcher.
//!
//! A FIFO of album ids waiting to be uploaded plus the id of the album whose
//! upload call is in flight. Only one album is handed to the backend at a
//! time; the slot is cleared when that call returns, whatever it returned.
//! An id is never both queued and in flight, nor queued twice.
//!
//! The dispatcher never moves an album past `InQueue` itself. `Uploading` and
//! the terminal states arrive as push events from the backend.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use super::error::{UploaderError, UploaderResult, ValidationIssue};
use super::models::{AlbumEntry, AlbumId, AlbumMetadata, AlbumState, SongRef};
use super::registry::AlbumRegistry;

/// Everything the backend needs to upload one album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchJob {
    pub album: AlbumMetadata,
    pub songs: Vec<SongRef>,
}

#[derive(Debug, Default)]
pub struct UploadDispatcher {
    queue: VecDeque<AlbumId>,
    in_flight: Option<AlbumId>,
}

/// Collect every reason `album` can't be uploaded.
pub fn validate_album(album: &AlbumEntry) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if album.files.is_empty() {
        issues.push(ValidationIssue::NoFiles);
    }
    if album.name.is_empty() {
        issues.push(ValidationIssue::MissingName);
    }
    if album.artist.is_empty() {
        issues.push(ValidationIssue::MissingArtist);
    }
    issues
}

impl UploadDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The album whose upload call has not returned yet.
    pub fn in_flight(&self) -> Option<AlbumId> {
        self.in_flight
    }

    /// True when nothing is queued and nothing is in flight.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queue.is_empty()
    }

    /// Whether `album_id` is waiting in the queue or being uploaded.
    pub fn is_pending(&self, album_id: AlbumId) -> bool {
        self.in_flight == Some(album_id) || self.queue.contains(&album_id)
    }

    /// Queued album ids, head first.
    pub fn queued(&self) -> impl Iterator<Item = AlbumId> + '_ {
        self.queue.iter().copied()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Validate an album and append it to the queue.
    ///
    /// On success the album moves to `InQueue`. On failure nothing changes.
    pub fn request_upload(
        &mut self,
        registry: &mut AlbumRegistry,
        album_id: AlbumId,
    ) -> UploaderResult<()> {
        let album = registry
            .get(album_id)
            .ok_or(UploaderError::AlbumNotFound(album_id))?;
        // Push events may move a queued album to a terminal state before it is
        // dispatched, so the state alone does not tell whether it is pending.
        if album.state.is_busy() || self.is_pending(album_id) {
            return Err(UploaderError::AlbumBusy(album_id));
        }

        let issues = validate_album(album);
        if !issues.is_empty() {
            return Err(UploaderError::Validation(issues));
        }

        registry.set_album_state(album_id, AlbumState::InQueue)?;
        self.queue.push_back(album_id);
        info!(
            "Queued album {} for upload (queue length {})",
            album_id,
            self.queue.len()
        );
        Ok(())
    }

    /// Pop the head of the queue if nothing is in flight.
    ///
    /// Marks the dispatcher busy when a job is returned. Queued ids that no
    /// longer resolve to an album are dropped.
    pub fn next_dispatch(&mut self, registry: &AlbumRegistry) -> Option<DispatchJob> {
        if self.in_flight.is_some() {
            return None;
        }
        while let Some(album_id) = self.queue.pop_front() {
            let Some(album) = registry.get(album_id) else {
                warn!("Queued album {} no longer exists, skipping", album_id);
                continue;
            };
            self.in_flight = Some(album_id);
            debug!(
                "Dispatching album {} with {} files",
                album_id,
                album.files.len()
            );
            return Some(DispatchJob {
                album: album.metadata(),
                songs: album.songs(),
            });
        }
        None
    }

    /// Called when the in-flight upload call returns.
    pub fn complete(&mut self) {
        if self.in_flight.take().is_none() {
            warn!("Upload completion received while dispatcher was idle");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploader::extension_filter::ExtensionFilter;
    use crate::uploader::models::FileId;

    fn ready_album(registry: &mut AlbumRegistry, name: &str) -> AlbumId {
        let id = registry.create_and_select_album();
        registry.set_album_name(name).unwrap();
        registry.set_album_artist("Artist").unwrap();
        let filter = ExtensionFilter::new(["mp3"]);
        let files = vec![format!("/music/{}/01.mp3", name)];
        registry
            .add_files(id, &files, &filter, || FileId(format!("{}-01", name)))
            .unwrap();
        id
    }

    #[test]
    fn test_request_upload_collects_all_issues() {
        let mut registry = AlbumRegistry::new();
        let mut dispatcher = UploadDispatcher::new();
        let id = registry.selected_id();

        let err = dispatcher.request_upload(&mut registry, id).unwrap_err();
        match err {
            UploaderError::Validation(issues) => assert_eq!(
                issues,
                vec![
                    ValidationIssue::NoFiles,
                    ValidationIssue::MissingName,
                    ValidationIssue::MissingArtist
                ]
            ),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(registry.get(id).unwrap().state, AlbumState::Selecting);
        assert_eq!(dispatcher.queue_len(), 0);
    }

    #[test]
    fn test_request_upload_with_empty_artist_is_rejected() {
        let mut registry = AlbumRegistry::new();
        let mut dispatcher = UploadDispatcher::new();
        let id = ready_album(&mut registry, "x");
        registry.set_album_artist("").unwrap();

        let err = dispatcher.request_upload(&mut registry, id).unwrap_err();
        assert!(matches!(err, UploaderError::Validation(ref v) if v == &vec![ValidationIssue::MissingArtist]));
        assert_eq!(registry.get(id).unwrap().state, AlbumState::Selecting);
        assert!(dispatcher.is_idle());
    }

    #[test]
    fn test_request_upload_queues_and_marks_in_queue() {
        let mut registry = AlbumRegistry::new();
        let mut dispatcher = UploadDispatcher::new();
        let id = ready_album(&mut registry, "x");

        dispatcher.request_upload(&mut registry, id).unwrap();
        assert_eq!(registry.get(id).unwrap().state, AlbumState::InQueue);
        assert_eq!(dispatcher.queued().collect::<Vec<_>>(), vec![id]);
    }

    #[test]
    fn test_request_upload_twice_is_rejected() {
        let mut registry = AlbumRegistry::new();
        let mut dispatcher = UploadDispatcher::new();
        let id = ready_album(&mut registry, "x");

        dispatcher.request_upload(&mut registry, id).unwrap();
        let err = dispatcher.request_upload(&mut registry, id).unwrap_err();
        assert!(matches!(err, UploaderError::AlbumBusy(_)));
        assert_eq!(dispatcher.queue_len(), 1);
    }

    #[test]
    fn test_dispatches_one_at_a_time_in_fifo_order() {
        let mut registry = AlbumRegistry::new();
        let mut dispatcher = UploadDispatcher::new();
        let a = ready_album(&mut registry, "a");
        let b = ready_album(&mut registry, "b");
        dispatcher.request_upload(&mut registry, a).unwrap();
        dispatcher.request_upload(&mut registry, b).unwrap();

        let first = dispatcher.next_dispatch(&registry).unwrap();
        assert_eq!(first.album.id, a);
        assert_eq!(first.songs.len(), 1);
        assert_eq!(first.songs[0].song_name, "01.mp3");
        assert!(dispatcher.is_busy());

        // Nothing else leaves the queue until the in-flight call returns.
        assert!(dispatcher.next_dispatch(&registry).is_none());

        dispatcher.complete();
        let second = dispatcher.next_dispatch(&registry).unwrap();
        assert_eq!(second.album.id, b);

        dispatcher.complete();
        assert!(dispatcher.next_dispatch(&registry).is_none());
        assert!(dispatcher.is_idle());
    }

    #[test]
    fn test_dispatch_does_not_set_uploading() {
        let mut registry = AlbumRegistry::new();
        let mut dispatcher = UploadDispatcher::new();
        let a = ready_album(&mut registry, "a");
        dispatcher.request_upload(&mut registry, a).unwrap();
        dispatcher.next_dispatch(&registry).unwrap();
        assert_eq!(registry.get(a).unwrap().state, AlbumState::InQueue);
    }

    #[test]
    fn test_terminal_album_can_be_requeued() {
        let mut registry = AlbumRegistry::new();
        let mut dispatcher = UploadDispatcher::new();
        let a = ready_album(&mut registry, "a");
        registry.set_album_state(a, AlbumState::UploadFail).unwrap();

        dispatcher.request_upload(&mut registry, a).unwrap();
        assert_eq!(registry.get(a).unwrap().state, AlbumState::InQueue);
    }

    #[test]
    fn test_album_finished_early_by_event_is_not_queued_twice() {
        let mut registry = AlbumRegistry::new();
        let mut dispatcher = UploadDispatcher::new();
        let a = ready_album(&mut registry, "a");
        let b = ready_album(&mut registry, "b");
        dispatcher.request_upload(&mut registry, a).unwrap();
        dispatcher.request_upload(&mut registry, b).unwrap();
        dispatcher.next_dispatch(&registry).unwrap();

        // A report for the still queued album lands before its dispatch.
        registry.set_album_state(b, AlbumState::UploadFail).unwrap();
        let err = dispatcher.request_upload(&mut registry, b).unwrap_err();
        assert!(matches!(err, UploaderError::AlbumBusy(id) if id == b));
        assert_eq!(dispatcher.queued().collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn test_album_in_flight_cannot_be_requeued() {
        let mut registry = AlbumRegistry::new();
        let mut dispatcher = UploadDispatcher::new();
        let a = ready_album(&mut registry, "a");
        dispatcher.request_upload(&mut registry, a).unwrap();
        dispatcher.next_dispatch(&registry).unwrap();
        assert_eq!(dispatcher.in_flight(), Some(a));

        registry.set_album_state(a, AlbumState::UploadSuccess).unwrap();
        let err = dispatcher.request_upload(&mut registry, a).unwrap_err();
        assert!(matches!(err, UploaderError::AlbumBusy(_)));
        assert_eq!(dispatcher.queue_len(), 0);

        dispatcher.complete();
        dispatcher.request_upload(&mut registry, a).unwrap();
        assert_eq!(dispatcher.queue_len(), 1);
    }
}
