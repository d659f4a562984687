// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cache GC Use Case
//!
//! Runs an eviction pass over the configured artifact cache root: expired
//! entries first, then LRU trimming down to the size budget.

use crate::infrastructure::cache::ArtifactCache;
use crate::infrastructure::config::ConfigLoader;
use anyhow::Result;
use std::path::Path;
use tracing::info;

/// Use case behind `subtitle-pipeline cache-gc`.
pub struct CacheGcUseCase;

impl CacheGcUseCase {
    pub fn execute(defaults_file: Option<&Path>) -> Result<()> {
        let config = ConfigLoader::load(defaults_file, None)?;
        let cache = ArtifactCache::new(
            config.cache.resolved_root(),
            config.cache.max_bytes,
            config.cache.ttl_days,
        );

        let before = cache.total_size()?;
        let report = cache.evict()?;
        let after = cache.total_size()?;

        info!(
            removed = report.entries_removed,
            reclaimed = report.bytes_reclaimed,
            "cache eviction pass complete"
        );
        println!("cache root:     {}", cache.root().display());
        println!("entries removed: {}", report.entries_removed);
        println!("bytes reclaimed: {}", report.bytes_reclaimed);
        println!("size: {} -> {} (budget {})", before, after, config.cache.max_bytes);
        Ok(())
    }
}
