// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Artifact Cache
//!
//! Content-addressed store of reusable per-stage outputs, laid out as
//! `<cache_root>/<stage>/<key>/{entry.json, artifacts…}` where `key` is the
//! stage fingerprint.
//!
//! ## Atomicity
//!
//! An entry is atomically complete or absent. `store` assembles the entry
//! in a hidden temp directory inside the same stage subtree and publishes
//! it with a single `rename`; readers can never observe a half-written
//! entry because only the rename makes it visible. Concurrent stores of
//! the same key resolve last-writer-wins, with the loser deleting its
//! temp directory.
//!
//! ## Integrity
//!
//! Every artifact's SHA-256 is recorded in `entry.json` and re-verified on
//! both `lookup` and `restore`. A mismatch anywhere deletes the whole
//! entry: a corrupt entry behaves exactly like a miss, and the stage
//! re-executes.
//!
//! ## Boundaries
//!
//! The cache manages only its own root. It never deletes anything inside a
//! job directory, and stage subprocesses cannot reach it at all.

use crate::infrastructure::cache::entry::{CacheEntry, CachedFile, ENTRY_MANIFEST_FILE};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use subtitle_pipeline_domain::{PipelineError, StageFingerprint};
use tracing::{debug, warn};

/// Prefix of in-flight store directories, skipped by eviction and lookup.
const TEMP_PREFIX: &str = ".tmp-";

/// An artifact handed to [`ArtifactCache::store`].
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub logical_name: String,
    pub path: PathBuf,
}

/// Result of an eviction pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvictionReport {
    pub entries_removed: usize,
    pub bytes_reclaimed: u64,
}

/// Content-addressed artifact store.
pub struct ArtifactCache {
    root: PathBuf,
    max_bytes: u64,
    ttl_days: u32,
}

impl ArtifactCache {
    pub fn new(root: PathBuf, max_bytes: u64, ttl_days: u32) -> Self {
        Self {
            root,
            max_bytes,
            ttl_days,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, stage: &str, key: &StageFingerprint) -> PathBuf {
        self.root.join(stage).join(key.as_str())
    }

    /// Looks up an entry and verifies its integrity.
    ///
    /// Returns `None` on a miss. A present-but-corrupt entry (unparsable
    /// manifest, missing file, digest mismatch) is deleted and reported as
    /// a miss. A successful lookup touches `last_used_at`.
    pub fn lookup(&self, stage: &str, key: &StageFingerprint) -> Result<Option<CacheEntry>, PipelineError> {
        let dir = self.entry_dir(stage, key);
        if !dir.exists() {
            return Ok(None);
        }

        let entry = match self.read_entry(&dir) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(stage, key = key.short(), "deleting unreadable cache entry: {}", e);
                let _ = std::fs::remove_dir_all(&dir);
                return Ok(None);
            }
        };

        for file in &entry.files {
            let path = dir.join(&file.relative_path);
            match Self::hash_file(&path) {
                Ok((digest, size)) if digest == file.sha256 && size == file.size => {}
                _ => {
                    warn!(
                        stage,
                        key = key.short(),
                        artifact = %file.relative_path,
                        "cache entry failed integrity check, deleting"
                    );
                    let _ = std::fs::remove_dir_all(&dir);
                    return Ok(None);
                }
            }
        }

        let mut touched = entry.clone();
        touched.last_used_at = chrono::Utc::now();
        // Touch failures are not worth failing a hit over.
        if let Err(e) = self.write_entry_manifest(&dir, &touched) {
            debug!(stage, key = key.short(), "failed to touch cache entry: {}", e);
        }

        Ok(Some(touched))
    }

    /// Stores artifacts under a key, atomically.
    ///
    /// # Errors
    ///
    /// Returns `IoError` when the entry cannot be assembled. Callers treat
    /// store failures as non-fatal: the stage already succeeded.
    pub fn store(
        &self,
        stage: &str,
        key: &StageFingerprint,
        files: &[StoredFile],
        source_job_id: &str,
    ) -> Result<(), PipelineError> {
        let stage_dir = self.root.join(stage);
        std::fs::create_dir_all(&stage_dir)?;

        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(&stage_dir)?;

        let mut cached_files = Vec::with_capacity(files.len());
        for file in files {
            let file_name = file
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    PipelineError::io_error(format!("artifact path {} has no file name", file.path.display()))
                })?;
            let dest = temp.path().join(file_name);
            std::fs::copy(&file.path, &dest)?;
            let (sha256, size) = Self::hash_file(&dest)?;
            cached_files.push(CachedFile {
                logical_name: file.logical_name.clone(),
                relative_path: file_name.to_string(),
                size,
                sha256,
            });
        }

        let now = chrono::Utc::now();
        let entry = CacheEntry {
            key: key.to_string(),
            stage: stage.to_string(),
            created_at: now,
            last_used_at: now,
            source_job_id: source_job_id.to_string(),
            files: cached_files,
        };
        self.write_entry_manifest(temp.path(), &entry)?;

        let final_dir = self.entry_dir(stage, key);
        let temp_path = temp.keep();
        if final_dir.exists() {
            // Last writer wins; drop the older entry before publishing.
            let _ = std::fs::remove_dir_all(&final_dir);
        }
        if let Err(e) = std::fs::rename(&temp_path, &final_dir) {
            // Lost a concurrent race; delete our temp and defer to the winner.
            let _ = std::fs::remove_dir_all(&temp_path);
            if final_dir.exists() {
                debug!(stage, key = key.short(), "concurrent store won the publish race");
                return Ok(());
            }
            return Err(PipelineError::io_error(format!(
                "failed to publish cache entry {}: {}",
                final_dir.display(),
                e
            )));
        }
        debug!(stage, key = key.short(), files = files.len(), "stored cache entry");
        Ok(())
    }

    /// Restores every file of an entry into `dest_dir`, verifying digests
    /// during the copy.
    ///
    /// # Errors
    ///
    /// Returns `CacheCorrupt` on any digest mismatch; the entry is deleted
    /// first so the caller can re-execute the stage as a miss.
    pub fn restore(
        &self,
        stage: &str,
        key: &StageFingerprint,
        dest_dir: &Path,
    ) -> Result<CacheEntry, PipelineError> {
        let dir = self.entry_dir(stage, key);
        let entry = self.read_entry(&dir).map_err(|e| {
            PipelineError::cache_corrupt(format!("entry {}/{}: {}", stage, key.short(), e))
        })?;

        std::fs::create_dir_all(dest_dir)?;
        let mut restored: u64 = 0;
        for file in &entry.files {
            let src = dir.join(&file.relative_path);
            let dest = dest_dir.join(&file.relative_path);
            std::fs::copy(&src, &dest)?;
            let (digest, size) = Self::hash_file(&dest)?;
            if digest != file.sha256 || size != file.size {
                let _ = std::fs::remove_dir_all(&dir);
                let _ = std::fs::remove_file(&dest);
                return Err(PipelineError::cache_corrupt(format!(
                    "artifact {} of entry {}/{} failed verification on restore",
                    file.relative_path,
                    stage,
                    key.short()
                )));
            }
            restored += size;
        }
        debug!(stage, key = key.short(), bytes = restored, "restored cache entry");
        Ok(entry)
    }

    /// Removes expired entries, then trims to the size budget in LRU order.
    ///
    /// The cache only ever deletes inside its own root.
    pub fn evict(&self) -> Result<EvictionReport, PipelineError> {
        let mut report = EvictionReport::default();
        if !self.root.exists() {
            return Ok(report);
        }

        let mut entries: Vec<(PathBuf, CacheEntry, u64)> = Vec::new();
        for stage_dir in Self::subdirs(&self.root)? {
            for entry_dir in Self::subdirs(&stage_dir)? {
                let name = entry_dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                if name.starts_with(TEMP_PREFIX) {
                    continue;
                }
                match self.read_entry(&entry_dir) {
                    Ok(entry) => {
                        let size = Self::dir_size(&entry_dir)?;
                        entries.push((entry_dir, entry, size));
                    }
                    Err(_) => {
                        // Not a valid entry; reclaim the space.
                        let size = Self::dir_size(&entry_dir).unwrap_or(0);
                        let _ = std::fs::remove_dir_all(&entry_dir);
                        report.entries_removed += 1;
                        report.bytes_reclaimed += size;
                    }
                }
            }
        }

        let ttl = chrono::Duration::days(i64::from(self.ttl_days));
        let now = chrono::Utc::now();
        let mut live: Vec<(PathBuf, CacheEntry, u64)> = Vec::new();
        for (dir, entry, size) in entries {
            if now - entry.created_at > ttl {
                debug!(key = %entry.key, "evicting expired cache entry");
                let _ = std::fs::remove_dir_all(&dir);
                report.entries_removed += 1;
                report.bytes_reclaimed += size;
            } else {
                live.push((dir, entry, size));
            }
        }

        let mut total: u64 = live.iter().map(|(_, _, size)| size).sum();
        if total > self.max_bytes {
            live.sort_by_key(|(_, entry, _)| entry.last_used_at);
            for (dir, entry, size) in live {
                if total <= self.max_bytes {
                    break;
                }
                debug!(key = %entry.key, "evicting cache entry over size budget");
                let _ = std::fs::remove_dir_all(&dir);
                report.entries_removed += 1;
                report.bytes_reclaimed += size;
                total = total.saturating_sub(size);
            }
        }

        Ok(report)
    }

    /// Total bytes currently stored under the cache root.
    pub fn total_size(&self) -> Result<u64, PipelineError> {
        if !self.root.exists() {
            return Ok(0);
        }
        Self::dir_size(&self.root)
    }

    fn read_entry(&self, entry_dir: &Path) -> Result<CacheEntry, PipelineError> {
        let manifest = entry_dir.join(ENTRY_MANIFEST_FILE);
        let content = std::fs::read_to_string(&manifest)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes `entry.json` via temp file + rename so concurrent readers
    /// never see a torn manifest.
    fn write_entry_manifest(&self, entry_dir: &Path, entry: &CacheEntry) -> Result<(), PipelineError> {
        let content = serde_json::to_string_pretty(entry)?;
        let temp = entry_dir.join(format!("{}{}", TEMP_PREFIX, ENTRY_MANIFEST_FILE));
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, entry_dir.join(ENTRY_MANIFEST_FILE))?;
        Ok(())
    }

    fn hash_file(path: &Path) -> Result<(String, u64), PipelineError> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 64 * 1024];
        let mut size: u64 = 0;
        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            size += read as u64;
        }
        Ok((hex::encode(hasher.finalize()), size))
    }

    fn subdirs(path: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }

    fn dir_size(path: &Path) -> Result<u64, PipelineError> {
        let mut total = 0;
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                total += Self::dir_size(&entry.path())?;
            } else if file_type.is_file() {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    }
}
