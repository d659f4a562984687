// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Descriptor File
//!
//! The immutable `job.toml` written into the job directory by `prepare`
//! and read back by `run`. It carries everything the orchestrator needs to
//! reconstruct the domain [`Job`] plus the job's configuration overrides;
//! the descriptor is never rewritten after creation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use subtitle_pipeline_domain::{Job, JobId, LanguageCode, PipelineError, Workflow};

/// File name of the descriptor inside the job directory.
pub const JOB_DESCRIPTOR_FILE: &str = "job.toml";

/// The `[job]` table of the descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSection {
    pub job_id: String,
    pub workflow: String,
    pub media_path: PathBuf,
    pub source_language: String,
    #[serde(default)]
    pub target_languages: Vec<String>,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub debug: bool,
}

/// The persisted job descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job: JobSection,
    /// Config overrides layered over the process defaults
    #[serde(default)]
    pub overrides: Option<toml::Value>,
}

impl JobDescriptor {
    /// Loads the descriptor from a job directory.
    ///
    /// # Errors
    ///
    /// Returns `JobNotFound` when the file does not exist and
    /// `InvalidConfiguration` when it fails to parse.
    pub fn load(job_dir: &Path) -> Result<Self, PipelineError> {
        let path = job_dir.join(JOB_DESCRIPTOR_FILE);
        if !path.exists() {
            return Err(PipelineError::JobNotFound(format!(
                "no job descriptor at {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| {
            PipelineError::invalid_config(format!("malformed descriptor {}: {}", path.display(), e))
        })
    }

    /// Writes the descriptor into a job directory.
    pub fn save(&self, job_dir: &Path) -> Result<(), PipelineError> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            PipelineError::SerializationError(format!("failed to encode job descriptor: {}", e))
        })?;
        std::fs::write(job_dir.join(JOB_DESCRIPTOR_FILE), content)?;
        Ok(())
    }

    /// Reconstructs the validated domain job.
    pub fn to_job(&self, job_dir: &Path) -> Result<Job, PipelineError> {
        let job_id: JobId = self.job.job_id.parse()?;
        let workflow: Workflow = self.job.workflow.parse()?;
        let source = LanguageCode::new(&self.job.source_language)?;
        let targets = self
            .job
            .target_languages
            .iter()
            .map(|l| LanguageCode::new(l))
            .collect::<Result<Vec<_>, _>>()?;
        Job::new(
            job_id,
            workflow,
            self.job.media_path.clone(),
            source,
            targets,
            job_dir.to_path_buf(),
            self.job.start,
            self.job.end,
            self.job.duration,
            self.job.debug,
        )
    }
}
