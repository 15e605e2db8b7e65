//! Multipart song upload.
//!
//! Songs larger than [`MULTIPART_THRESHOLD_BYTES`] are declared to the server
//! by hash first and then sent in fixed-size parts. The server answers every
//! declaration with the parts it already holds, so an interrupted upload
//! resumes instead of starting over.

use std::collections::HashSet;
use std::ops::Range;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::client::{hex_sha256, UploaderClientError};
use super::models::AlbumMetadata;

pub const MEGABYTE_BYTES: u32 = 1_000_000;

/// Songs above this size are uploaded in parts.
pub const MULTIPART_THRESHOLD_BYTES: usize = MEGABYTE_BYTES as usize;

pub const MAX_MULTIPART_UPLOAD_ATTEMPTS: u8 = 2;

/// Body of a `declareupload` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclareUploadRequest {
    pub file: String,
    pub album: String,
    pub artist: String,
    pub hash: String,
    pub size: u64,
    pub part_size: u32,
}

/// Server answer to a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum DeclareUploadResponse {
    /// The server holds the whole song.
    Complete,
    Incomplete {
        key: String,
        declared_size: u64,
        /// Part size the server settled on; may differ from the requested one
        part_size: u32,
        received_parts: Vec<u8>,
    },
}

/// The two requests a multipart upload is made of.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait PartTransport: Send + Sync {
    async fn declare_upload(
        &self,
        request: DeclareUploadRequest,
    ) -> Result<DeclareUploadResponse, UploaderClientError>;

    async fn upload_part(
        &self,
        key: &str,
        index: u8,
        data: Vec<u8>,
    ) -> Result<String, UploaderClientError>;
}

/// Number of parts `len` bytes split into. Part indices must fit a `u8`.
pub fn num_parts(len: usize, part_size: u32) -> Result<u8, UploaderClientError> {
    if part_size == 0 {
        return Err(UploaderClientError::MultipartFailure(
            "part size must be greater than zero".to_string(),
        ));
    }
    let count = len.div_ceil(part_size as usize);
    u8::try_from(count).map_err(|_| {
        UploaderClientError::MultipartFailure(format!(
            "cannot upload a file in {} parts of {} bytes",
            count, part_size
        ))
    })
}

/// Byte range of part `index`, or `None` if it would be empty.
pub fn part_range(len: usize, index: u8, part_size: u32) -> Option<Range<usize>> {
    let start = index as usize * part_size as usize;
    let end = len.min(start + part_size as usize);
    (start < end).then_some(start..end)
}

/// Upload `data` in parts, skipping the parts the server reports as received.
///
/// A song the server already holds at the first declaration is reported as
/// an error, so the album report shows it was not uploaded by this run.
pub async fn upload_in_parts(
    transport: &dyn PartTransport,
    album: &AlbumMetadata,
    song_name: &str,
    data: &[u8],
    part_size: u32,
) -> Result<String, UploaderClientError> {
    let hash = hex_sha256(data);
    info!(
        "Starting multipart upload of {} ({} bytes)",
        song_name,
        data.len()
    );

    for attempt in 0..MAX_MULTIPART_UPLOAD_ATTEMPTS {
        let response = transport
            .declare_upload(DeclareUploadRequest {
                file: song_name.to_string(),
                album: album.name.clone(),
                artist: album.artist.clone(),
                hash: hash.clone(),
                size: data.len() as u64,
                part_size,
            })
            .await?;

        let DeclareUploadResponse::Incomplete {
            key,
            part_size,
            received_parts,
            ..
        } = response
        else {
            if attempt == 0 {
                return Err(UploaderClientError::MultipartFailure(
                    "Song already present".to_string(),
                ));
            }
            return Ok(format!(
                "Succeeded multipart upload of {} on attempt {}",
                song_name,
                attempt + 1
            ));
        };

        let received: HashSet<u8> = received_parts.into_iter().collect();
        for index in 0..num_parts(data.len(), part_size)? {
            if received.contains(&index) {
                debug!("Skipping part {} of {}, already uploaded", index, song_name);
                continue;
            }
            let range = part_range(data.len(), index, part_size).ok_or_else(|| {
                UploaderClientError::MultipartFailure(format!(
                    "Tried to upload a zero size part for index {}",
                    index
                ))
            })?;
            let result = transport
                .upload_part(&key, index, data[range].to_vec())
                .await?;
            debug!("Upload part {} of {}: {}", index, song_name, result);
        }
    }

    Err(UploaderClientError::MultipartFailure(format!(
        "Could not upload {} after {} attempts",
        song_name, MAX_MULTIPART_UPLOAD_ATTEMPTS
    )))
}
