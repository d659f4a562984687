// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Manifest Store
//!
//! Durable persistence for `<job_dir>/manifest.json`. The manifest is the
//! authority for resume decisions, so every save follows the full
//! durability sequence: write to a temp file in the same directory, fsync
//! the file, rename over the target, then fsync the directory. A crash at
//! any point leaves either the old complete manifest or the new complete
//! manifest — never a torn one.
//!
//! The store has a single writer (the orchestrator); stages never touch
//! the manifest.

use std::path::{Path, PathBuf};
use subtitle_pipeline_domain::{JobManifest, PipelineError};

/// Load/save access to one job's manifest file.
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(manifest_path: PathBuf) -> Self {
        Self { path: manifest_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the manifest.
    ///
    /// # Errors
    ///
    /// Returns `IoError` when the file is unreadable and
    /// `SerializationError` when it does not parse; a corrupt manifest is
    /// surfaced rather than silently rebuilt, because rebuilding would
    /// forget completed stages.
    pub fn load(&self) -> Result<JobManifest, PipelineError> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Persists the manifest durably (temp + fsync + rename + dir fsync).
    pub fn save(&self, manifest: &JobManifest) -> Result<(), PipelineError> {
        let parent = self.path.parent().ok_or_else(|| {
            PipelineError::io_error(format!("manifest path {} has no parent", self.path.display()))
        })?;
        let content = serde_json::to_string_pretty(manifest)?;

        let temp = parent.join(".manifest.json.tmp");
        {
            use std::io::Write;
            let mut file = std::fs::File::create(&temp)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&temp, &self.path)?;
        // fsync the directory so the rename itself is durable
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}
