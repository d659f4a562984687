// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cache Entry Manifest
//!
//! The `entry.json` document stored next to the artifacts of one cache
//! entry. It is the integrity authority for the entry: a file listed here
//! whose on-disk digest no longer matches makes the whole entry corrupt,
//! and a directory without a parsable `entry.json` is not an entry at all.

use serde::{Deserialize, Serialize};
use subtitle_pipeline_domain::services::datetime_serde;

/// File name of the entry manifest inside an entry directory.
pub const ENTRY_MANIFEST_FILE: &str = "entry.json";

/// One artifact recorded in a cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedFile {
    pub logical_name: String,
    pub relative_path: String,
    pub size: u64,
    pub sha256: String,
}

/// The entry manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub stage: String,
    #[serde(with = "datetime_serde")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(with = "datetime_serde")]
    pub last_used_at: chrono::DateTime<chrono::Utc>,
    pub source_job_id: String,
    pub files: Vec<CachedFile>,
}

impl CacheEntry {
    /// Total artifact bytes recorded in the manifest.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}
