// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Media Identity Service
//!
//! Computes the [`MediaFingerprint`] for a media file. The content hash is
//! a SHA-256 over `size_le_u64 ‖ first 1 MiB ‖ last 1 MiB`. Hashing whole
//! multi-gigabyte containers is rejected as too slow for the 70-85 %
//! re-run speedup the cache exists to provide; the head/tail sample is
//! content-sensitive because any re-encode or trim of an opaque container
//! changes the size or those regions.
//!
//! The service is deterministic and pure: same file plus same
//! normalization parameters always produces the same fingerprint. No
//! network access, no container parsing.

use sha2::{Digest, Sha256};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use subtitle_pipeline_domain::{MediaFingerprint, NormalizationParams, PipelineError};

/// Bytes sampled from each end of the file.
const SAMPLE_BYTES: u64 = 1024 * 1024;

/// Computes media fingerprints from files on disk.
pub struct MediaIdentity;

impl MediaIdentity {
    /// Fingerprints a media file under the given normalization parameters.
    ///
    /// # Errors
    ///
    /// Returns `MediaUnreadable` when the path is missing, not a regular
    /// file, zero bytes long, or unreadable.
    pub fn fingerprint(
        media_path: &Path,
        params: &NormalizationParams,
        media_duration: Option<f64>,
    ) -> Result<MediaFingerprint, PipelineError> {
        let metadata = std::fs::metadata(media_path).map_err(|e| {
            PipelineError::media_unreadable(format!("{}: {}", media_path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(PipelineError::media_unreadable(format!(
                "{} is not a regular file",
                media_path.display()
            )));
        }
        let size = metadata.len();
        if size == 0 {
            return Err(PipelineError::media_unreadable(format!(
                "{} is empty",
                media_path.display()
            )));
        }

        let content_hash = Self::content_hash(media_path, size)?;
        Ok(MediaFingerprint::new(content_hash, params.clone(), media_duration))
    }

    /// SHA-256 over size plus head and tail samples.
    ///
    /// Files shorter than two samples hash overlapping regions; the digest
    /// stays deterministic because the read windows depend only on size.
    fn content_hash(media_path: &Path, size: u64) -> Result<String, PipelineError> {
        let mut file = std::fs::File::open(media_path).map_err(|e| {
            PipelineError::media_unreadable(format!("{}: {}", media_path.display(), e))
        })?;

        let mut hasher = Sha256::new();
        hasher.update(size.to_le_bytes());

        let head_len = SAMPLE_BYTES.min(size);
        let mut buffer = vec![0u8; head_len as usize];
        file.read_exact(&mut buffer).map_err(|e| {
            PipelineError::media_unreadable(format!("reading head of {}: {}", media_path.display(), e))
        })?;
        hasher.update(&buffer);

        let tail_start = size.saturating_sub(SAMPLE_BYTES);
        let tail_len = size - tail_start;
        file.seek(SeekFrom::Start(tail_start)).map_err(|e| {
            PipelineError::media_unreadable(format!("seeking tail of {}: {}", media_path.display(), e))
        })?;
        let mut buffer = vec![0u8; tail_len as usize];
        file.read_exact(&mut buffer).map_err(|e| {
            PipelineError::media_unreadable(format!("reading tail of {}: {}", media_path.display(), e))
        })?;
        hasher.update(&buffer);

        Ok(hex::encode(hasher.finalize()))
    }
}
