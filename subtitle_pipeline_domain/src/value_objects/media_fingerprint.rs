// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Media Fingerprint
//!
//! Content-addressed identity of one media file under one set of audio
//! normalization parameters. The fingerprint is the root of every stage's
//! cache key: two jobs with equal media fingerprints can share every
//! cacheable stage output whose parameters also match.
//!
//! ## Identity Rules
//!
//! - `content_hash` is a SHA-256 over the file size plus head and tail
//!   samples. Full-file hashing of multi-gigabyte containers is too slow;
//!   head/tail sampling is sufficient because any re-encode or trim of an
//!   opaque container changes the size or those regions.
//! - `normalization_params` contribute via canonical JSON with sorted keys,
//!   so serialization order can never split the cache.
//! - `media_duration` is informational only and excluded from the digest:
//!   the same file must fingerprint identically whether or not a probe ran.
//!
//! Filesystem location is deliberately absent; moving a file does not
//! invalidate its cache entries.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Audio normalization parameters that materially change prepared audio.
///
/// These are the only configuration values that participate in media
/// identity; everything stage-specific belongs in that stage's
/// `fingerprint_extras` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    /// Target sample rate in Hz for extracted audio
    pub sample_rate: u32,
    /// Target channel count (1 = mono)
    pub channels: u8,
    /// Optional clip start offset in seconds
    pub start: Option<f64>,
    /// Optional clip end offset in seconds
    pub end: Option<f64>,
    /// Optional codec request passed to the demuxer
    pub codec_request: Option<String>,
}

impl NormalizationParams {
    /// Canonical JSON rendering with sorted keys.
    ///
    /// Optional fields that are unset are omitted entirely, so adding a new
    /// optional parameter later does not re-key existing cache entries.
    pub fn canonical_json(&self) -> String {
        let mut map: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
        map.insert("channels", self.channels.into());
        map.insert("sample_rate", self.sample_rate.into());
        if let Some(start) = self.start {
            map.insert("start", serde_json::json!(start));
        }
        if let Some(end) = self.end {
            map.insert("end", serde_json::json!(end));
        }
        if let Some(ref codec) = self.codec_request {
            map.insert("codec_request", serde_json::json!(codec));
        }
        serde_json::to_string(&map).unwrap_or_default()
    }
}

impl Default for NormalizationParams {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            start: None,
            end: None,
            codec_request: None,
        }
    }
}

/// Stable identity of (media content, normalization parameters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFingerprint {
    content_hash: String,
    normalization_params: NormalizationParams,
    /// Informational; not part of cache identity
    media_duration: Option<f64>,
}

impl MediaFingerprint {
    /// Assembles a fingerprint from an already-computed content hash.
    ///
    /// The hash itself is computed by the media identity service, which owns
    /// the file I/O; this type owns only the identity semantics.
    pub fn new(
        content_hash: String,
        normalization_params: NormalizationParams,
        media_duration: Option<f64>,
    ) -> Self {
        Self {
            content_hash,
            normalization_params,
            media_duration,
        }
    }

    /// Hex SHA-256 of the sampled media content.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// The normalization parameters bound into this identity.
    pub fn normalization_params(&self) -> &NormalizationParams {
        &self.normalization_params
    }

    /// Duration in seconds, when the job descriptor knew it.
    pub fn media_duration(&self) -> Option<f64> {
        self.media_duration
    }

    /// Combined digest of content hash and canonical parameters.
    ///
    /// This is the value stage fingerprints derive from. `media_duration`
    /// is deliberately excluded.
    pub fn identity_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content_hash.as_bytes());
        hasher.update(b"\x00");
        hasher.update(self.normalization_params.canonical_json().as_bytes());
        hex::encode(hasher.finalize())
    }
}
