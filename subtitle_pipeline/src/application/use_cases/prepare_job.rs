// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Prepare Job Use Case
//!
//! Builds a job from CLI parameters: validates the media file and language
//! selection, allocates the next `YYYYMMDD-<user>-<seq>` identifier,
//! creates the job directory, and writes the immutable `job.toml`
//! descriptor. `run` picks the job up from there.

use crate::infrastructure::config::{ConfigLoader, JobDescriptor, JobSection};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use subtitle_pipeline_domain::{Job, JobId, LanguageCode, PipelineError, Workflow};
use tracing::info;

/// Parameters collected from the CLI.
#[derive(Debug, Clone)]
pub struct PrepareJobParams {
    pub media: PathBuf,
    pub workflow: String,
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub user: Option<String>,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub duration: Option<f64>,
    pub debug: bool,
}

/// Use case behind `subtitle-pipeline prepare`.
pub struct PrepareJobUseCase;

impl PrepareJobUseCase {
    /// Executes the use case and returns the allocated job id.
    pub fn execute(defaults_file: Option<&Path>, params: PrepareJobParams) -> Result<JobId> {
        let config = ConfigLoader::load(defaults_file, None)?;

        let workflow: Workflow = params.workflow.parse()?;
        let source = LanguageCode::new(&params.source_language)?;
        let targets = params
            .target_languages
            .iter()
            .map(|l| LanguageCode::new(l))
            .collect::<Result<Vec<_>, _>>()?;

        let media = params
            .media
            .canonicalize()
            .with_context(|| format!("media file {} not found", params.media.display()))?;
        let metadata = std::fs::metadata(&media)?;
        if !metadata.is_file() || metadata.len() == 0 {
            return Err(PipelineError::media_unreadable(format!(
                "{} is not a readable media file",
                media.display()
            ))
            .into());
        }

        let user = Self::resolve_user(params.user.as_deref())?;
        std::fs::create_dir_all(&config.jobs.root)?;
        let jobs_root = config.jobs.root.canonicalize()?;
        let job_id = Self::allocate_job_id(&jobs_root, &user)?;
        let job_dir = jobs_root.join(job_id.as_str());

        // Validate the whole job before touching the filesystem.
        let job = Job::new(
            job_id.clone(),
            workflow,
            media.clone(),
            source.clone(),
            targets.clone(),
            job_dir.clone(),
            params.start,
            params.end,
            params.duration,
            params.debug,
        )?;

        std::fs::create_dir(&job_dir)
            .with_context(|| format!("job directory {} already exists", job_dir.display()))?;
        let descriptor = JobDescriptor {
            job: JobSection {
                job_id: job_id.to_string(),
                workflow: workflow.to_string(),
                media_path: media,
                source_language: source.to_string(),
                target_languages: targets.iter().map(|l| l.to_string()).collect(),
                start: params.start,
                end: params.end,
                duration: params.duration,
                debug: params.debug,
            },
            overrides: None,
        };
        descriptor.save(&job_dir)?;

        info!(
            job_id = %job.job_id(),
            workflow = %job.workflow(),
            job_dir = %job_dir.display(),
            "job prepared"
        );
        Ok(job_id)
    }

    fn resolve_user(explicit: Option<&str>) -> Result<String> {
        let raw = match explicit {
            Some(user) => user.to_string(),
            None => std::env::var("USER").unwrap_or_else(|_| "operator".to_string()),
        };
        let user: String = raw
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
            .take(32)
            .collect();
        if user.is_empty() {
            return Err(PipelineError::validation_error(format!("unusable user segment '{}'", raw)).into());
        }
        Ok(user)
    }

    /// Next free sequence number for (today, user) under the jobs root.
    fn allocate_job_id(jobs_root: &Path, user: &str) -> Result<JobId> {
        let today = chrono::Local::now().date_naive();
        let prefix = format!("{}-{}-", today.format("%Y%m%d"), user);

        let mut max_seq: u16 = 0;
        if jobs_root.exists() {
            for entry in std::fs::read_dir(jobs_root)? {
                let entry = entry?;
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if let Some(seq) = name.strip_prefix(&prefix) {
                    if let Ok(seq) = seq.parse::<u16>() {
                        max_seq = max_seq.max(seq);
                    }
                }
            }
        }
        Ok(JobId::new(today, user, max_seq + 1)?)
    }
}
