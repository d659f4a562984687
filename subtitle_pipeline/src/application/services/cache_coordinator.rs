// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cache Coordinator
//!
//! Sits between the orchestrator and the artifact cache, making the
//! HIT/MISS decision for each cacheable invocation unit:
//!
//! - derives the [`StageFingerprint`] from the media fingerprint, the
//!   stage's declared `fingerprint_extras` values, its model id, and the
//!   fan-out target language;
//! - on HIT, restores the entry into the stage directory, after which the
//!   stage is observationally indistinguishable from a freshly-executed
//!   one;
//! - on MISS (including corrupt entries, which the cache deletes), lets
//!   the runner execute and then stores the declared outputs.
//!
//! Store failures are logged and swallowed: the stage already succeeded,
//! and a cold cache is a performance problem, not a correctness one.

use crate::infrastructure::cache::{ArtifactCache, CacheEntry, StoredFile};
use crate::infrastructure::config::JobConfig;
use crate::infrastructure::stage_io::StageWorkspace;
use std::collections::BTreeMap;
use std::sync::Arc;
use subtitle_pipeline_domain::{InvocationUnit, MediaFingerprint, PipelineError, StageFingerprint};
use tracing::{debug, info, warn};

/// HIT/MISS decision maker wrapping the artifact cache.
pub struct CacheCoordinator {
    cache: Option<ArtifactCache>,
    config: Arc<JobConfig>,
}

impl CacheCoordinator {
    /// Builds the coordinator; a disabled cache turns every decision into
    /// a miss without a store.
    pub fn new(config: Arc<JobConfig>) -> Self {
        let cache = config.cache.enabled.then(|| {
            ArtifactCache::new(
                config.cache.resolved_root(),
                config.cache.max_bytes,
                config.cache.ttl_days,
            )
        });
        Self { cache, config }
    }

    pub fn enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Derives the fingerprint for a cacheable unit; `None` for
    /// non-cacheable stages or a disabled cache.
    pub fn fingerprint_for(&self, media: &MediaFingerprint, unit: &InvocationUnit) -> Option<StageFingerprint> {
        if !unit.descriptor.cacheable || self.cache.is_none() {
            return None;
        }
        let extras: BTreeMap<String, String> = unit
            .descriptor
            .fingerprint_extras
            .iter()
            .map(|key| {
                let value = self.config.fingerprint_value(key).unwrap_or_default();
                (key.to_string(), value)
            })
            .collect();
        let model_id = unit
            .descriptor
            .model_key
            .and_then(|key| self.config.fingerprint_value(key));
        Some(StageFingerprint::derive(
            media,
            unit.descriptor.name,
            &extras,
            model_id.as_deref(),
            unit.language.as_ref(),
        ))
    }

    /// Attempts a HIT: looks the key up and restores into the stage
    /// directory. A corrupt entry is deleted by the cache and reported as
    /// a miss so the stage re-executes.
    pub fn try_restore(
        &self,
        unit: &InvocationUnit,
        fingerprint: &StageFingerprint,
        workspace: &StageWorkspace,
    ) -> Result<Option<CacheEntry>, PipelineError> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        if cache.lookup(unit.descriptor.name, fingerprint)?.is_none() {
            debug!(stage = unit.descriptor.name, key = fingerprint.short(), "cache miss");
            return Ok(None);
        }
        match cache.restore(unit.descriptor.name, fingerprint, workspace.stage_dir()) {
            Ok(entry) => {
                info!(
                    stage = unit.descriptor.name,
                    key = fingerprint.short(),
                    bytes = entry.total_size(),
                    "cache hit, outputs restored"
                );
                Ok(Some(entry))
            }
            Err(PipelineError::CacheCorrupt(msg)) => {
                // Entry already deleted; fall back to execution.
                warn!(stage = unit.descriptor.name, "cache entry corrupt, re-executing: {}", msg);
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// Stores a successful unit's declared outputs. Returns whether a
    /// store actually happened; failures are logged, never propagated.
    pub fn store_outputs(
        &self,
        unit: &InvocationUnit,
        fingerprint: &StageFingerprint,
        workspace: &StageWorkspace,
        source_job_id: &str,
    ) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        let files: Vec<StoredFile> = workspace
            .snapshot_outputs(unit.language.as_ref())
            .into_iter()
            .map(|(logical_name, path)| StoredFile { logical_name, path })
            .collect();
        if files.is_empty() {
            return false;
        }
        match cache.store(unit.descriptor.name, fingerprint, &files, source_job_id) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    stage = unit.descriptor.name,
                    key = fingerprint.short(),
                    "cache store failed (stage result unaffected): {}",
                    e
                );
                false
            }
        }
    }
}
