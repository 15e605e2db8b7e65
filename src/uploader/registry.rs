//! Album registry.
//!
//! Owns every album known to the session, the current selection and the id
//! counter. The registry always holds at least one album and the selection
//! always resolves to an existing key.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::error::{UploaderError, UploaderResult};
use super::extension_filter::ExtensionFilter;
use super::models::{AlbumEntry, AlbumId, AlbumState, FileEntry, FileId, FileState};

/// Outcome of admitting a batch of paths into an album.
///
/// Rejections are per-file; the rest of the batch is still admitted.
#[derive(Debug, Default)]
pub struct AdmissionReport {
    /// Paths appended to the album, in order
    pub admitted: Vec<String>,
    /// Why each skipped path was skipped
    pub rejected: Vec<UploaderError>,
}

impl AdmissionReport {
    pub fn merge(&mut self, other: AdmissionReport) {
        self.admitted.extend(other.admitted);
        self.rejected.extend(other.rejected);
    }
}

#[derive(Debug, Clone)]
pub struct AlbumRegistry {
    albums: BTreeMap<AlbumId, AlbumEntry>,
    selected: AlbumId,
    next_id: u64,
}

impl Default for AlbumRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AlbumRegistry {
    /// Create a registry holding a single empty album, selected.
    pub fn new() -> Self {
        let mut registry = Self {
            albums: BTreeMap::new(),
            selected: AlbumId(0),
            next_id: 0,
        };
        registry.selected = registry.insert_new_album();
        registry
    }

    fn allocate_id(&mut self) -> AlbumId {
        let id = AlbumId(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert_new_album(&mut self) -> AlbumId {
        let id = self.allocate_id();
        self.albums.insert(id, AlbumEntry::new(id));
        id
    }

    pub fn selected_id(&self) -> AlbumId {
        self.selected
    }

    /// The currently selected album.
    pub fn selected(&self) -> &AlbumEntry {
        // The selection is repaired on every removal so this lookup can't miss.
        &self.albums[&self.selected]
    }

    pub fn get(&self, id: AlbumId) -> Option<&AlbumEntry> {
        self.albums.get(&id)
    }

    /// All albums in id order.
    pub fn albums(&self) -> impl Iterator<Item = &AlbumEntry> {
        self.albums.values()
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }

    /// Returns the id of the album currently in `Uploading`, if any.
    pub fn uploading_album(&self) -> Option<AlbumId> {
        self.albums
            .values()
            .find(|a| a.state == AlbumState::Uploading)
            .map(|a| a.id)
    }

    pub fn create_and_select_album(&mut self) -> AlbumId {
        let id = self.insert_new_album();
        self.selected = id;
        debug!("Created and selected album {}", id);
        id
    }

    pub fn set_album_name(&mut self, name: &str) -> UploaderResult<()> {
        let album = self.editable_selected()?;
        album.name = name.to_string();
        Ok(())
    }

    pub fn set_album_artist(&mut self, artist: &str) -> UploaderResult<()> {
        let album = self.editable_selected()?;
        album.artist = artist.to_string();
        Ok(())
    }

    fn editable_selected(&mut self) -> UploaderResult<&mut AlbumEntry> {
        let id = self.selected;
        let album = self
            .albums
            .get_mut(&id)
            .ok_or(UploaderError::AlbumNotFound(id))?;
        if album.state.is_busy() {
            return Err(UploaderError::AlbumBusy(id));
        }
        Ok(album)
    }

    pub fn select_album(&mut self, id: AlbumId) -> UploaderResult<()> {
        if !self.albums.contains_key(&id) {
            return Err(UploaderError::AlbumNotFound(id));
        }
        self.selected = id;
        Ok(())
    }

    /// Remove an album unless it is queued or uploading.
    ///
    /// If the selected album is removed the selection moves to the lowest
    /// remaining id, or to a fresh album when none remain.
    pub fn close_album(&mut self, id: AlbumId) -> UploaderResult<()> {
        let album = self
            .albums
            .get(&id)
            .ok_or(UploaderError::AlbumNotFound(id))?;
        if album.state.is_busy() {
            return Err(UploaderError::AlbumBusy(id));
        }

        self.albums.remove(&id);
        info!("Closed album {}", id);

        if self.albums.is_empty() {
            self.selected = self.insert_new_album();
            info!("Last album closed, created album {}", self.selected);
        } else if self.selected == id {
            if let Some(next) = self.albums.keys().next() {
                self.selected = *next;
            }
        }
        Ok(())
    }

    /// Filter `paths` by extension, then admit the rest into `album_id`.
    ///
    /// `generate_id` is called once per path that passes the filter.
    pub fn add_files<F>(
        &mut self,
        album_id: AlbumId,
        paths: &[String],
        filter: &ExtensionFilter,
        mut generate_id: F,
    ) -> UploaderResult<AdmissionReport>
    where
        F: FnMut() -> FileId,
    {
        if !self.albums.contains_key(&album_id) {
            return Err(UploaderError::AlbumNotFound(album_id));
        }

        let mut report = AdmissionReport::default();
        let mut candidates = Vec::with_capacity(paths.len());
        for path in paths {
            if filter.is_admissible(path) {
                candidates.push((path.clone(), generate_id()));
            } else {
                report
                    .rejected
                    .push(UploaderError::DisallowedExtension(path.clone()));
            }
        }
        report.merge(self.admit_files(album_id, candidates)?);
        Ok(report)
    }

    /// Append already-filtered files to `album_id`, skipping duplicate paths.
    ///
    /// Rejected with `AlbumBusy` once the album is queued or uploading, since
    /// its file list has been handed to the dispatcher.
    pub fn admit_files(
        &mut self,
        album_id: AlbumId,
        candidates: Vec<(String, FileId)>,
    ) -> UploaderResult<AdmissionReport> {
        let album = self
            .albums
            .get_mut(&album_id)
            .ok_or(UploaderError::AlbumNotFound(album_id))?;
        if album.state.is_busy() {
            return Err(UploaderError::AlbumBusy(album_id));
        }

        let mut report = AdmissionReport::default();
        for (path, id) in candidates {
            if album.contains_path(&path) {
                report.rejected.push(UploaderError::DuplicatePath(path));
                continue;
            }
            album.files.push(FileEntry::new(id, path.clone()));
            report.admitted.push(path);
        }
        Ok(report)
    }

    pub fn set_album_state(&mut self, id: AlbumId, state: AlbumState) -> UploaderResult<()> {
        let album = self
            .albums
            .get_mut(&id)
            .ok_or(UploaderError::AlbumNotFound(id))?;
        album.state = state;
        Ok(())
    }

    pub fn set_file_state(
        &mut self,
        album_id: AlbumId,
        path: &str,
        state: FileState,
    ) -> UploaderResult<()> {
        let album = self
            .albums
            .get_mut(&album_id)
            .ok_or(UploaderError::AlbumNotFound(album_id))?;
        let file = album
            .file_mut(path)
            .ok_or_else(|| UploaderError::FileNotFound {
                album_id,
                path: path.to_string(),
            })?;
        file.state = state;
        Ok(())
    }
}
