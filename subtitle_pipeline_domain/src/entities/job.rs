// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Entity
//!
//! A `Job` describes exactly one pipeline run: one media file, one workflow,
//! one language selection, rooted in one job directory. Jobs are created by
//! the `prepare` use case, persisted as the job descriptor, and are
//! immutable from then on — a changed parameter is a new job, never a
//! mutated one. Only explicit user deletion removes a job.
//!
//! The entity validates the language selection against the workflow at
//! construction: `transcribe` takes no targets, `translate` takes exactly
//! one (the planner additionally clamps over-supplied lists with a
//! warning), and target lists never contain duplicates or `auto`.

use crate::services::datetime_serde;
use crate::value_objects::{JobId, LanguageCode, Workflow};
use crate::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One pipeline run for one media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    job_id: JobId,
    workflow: Workflow,
    media_path: PathBuf,
    source_language: LanguageCode,
    target_languages: Vec<LanguageCode>,
    job_dir: PathBuf,
    start_offset: Option<f64>,
    end_offset: Option<f64>,
    media_duration: Option<f64>,
    debug: bool,
    #[serde(with = "datetime_serde")]
    created_at: chrono::DateTime<chrono::Utc>,
}

impl Job {
    /// Creates a validated job.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when:
    /// - the job directory path is not absolute
    /// - targets are supplied for `transcribe`, or missing for a workflow
    ///   that translates
    /// - a target language is `auto` or duplicated
    /// - clip offsets are negative or inverted
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_id: JobId,
        workflow: Workflow,
        media_path: PathBuf,
        source_language: LanguageCode,
        target_languages: Vec<LanguageCode>,
        job_dir: PathBuf,
        start_offset: Option<f64>,
        end_offset: Option<f64>,
        media_duration: Option<f64>,
        debug: bool,
    ) -> Result<Self, PipelineError> {
        if !job_dir.is_absolute() {
            return Err(PipelineError::validation_error(format!(
                "job directory must be absolute, got '{}'",
                job_dir.display()
            )));
        }
        if workflow.translates() && target_languages.is_empty() {
            return Err(PipelineError::validation_error(format!(
                "workflow '{}' requires at least one target language",
                workflow
            )));
        }
        if !workflow.translates() && !target_languages.is_empty() {
            return Err(PipelineError::validation_error(
                "workflow 'transcribe' does not accept target languages".to_string(),
            ));
        }
        if target_languages.iter().any(|l| l.is_auto()) {
            return Err(PipelineError::validation_error(
                "'auto' is only valid as a source language".to_string(),
            ));
        }
        let deduped = LanguageCode::dedup_ordered(&target_languages);
        if deduped.len() != target_languages.len() {
            return Err(PipelineError::validation_error(
                "target languages must be unique".to_string(),
            ));
        }
        if let Some(start) = start_offset {
            if start < 0.0 {
                return Err(PipelineError::validation_error("clip start must be >= 0".to_string()));
            }
        }
        if let (Some(start), Some(end)) = (start_offset, end_offset) {
            if end <= start {
                return Err(PipelineError::validation_error(format!(
                    "clip end {} must be after clip start {}",
                    end, start
                )));
            }
        }

        Ok(Job {
            job_id,
            workflow,
            media_path,
            source_language,
            target_languages: deduped,
            job_dir,
            start_offset,
            end_offset,
            media_duration,
            debug,
            created_at: chrono::Utc::now(),
        })
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn workflow(&self) -> Workflow {
        self.workflow
    }

    pub fn media_path(&self) -> &Path {
        &self.media_path
    }

    pub fn source_language(&self) -> &LanguageCode {
        &self.source_language
    }

    pub fn target_languages(&self) -> &[LanguageCode] {
        &self.target_languages
    }

    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    pub fn start_offset(&self) -> Option<f64> {
        self.start_offset
    }

    pub fn end_offset(&self) -> Option<f64> {
        self.end_offset
    }

    /// Duration in seconds when the submitter knew it; informational only.
    pub fn media_duration(&self) -> Option<f64> {
        self.media_duration
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn created_at(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.created_at
    }

    /// Path of the job manifest inside the job directory.
    pub fn manifest_path(&self) -> PathBuf {
        self.job_dir.join("manifest.json")
    }

    /// Path of the per-job aggregate log.
    pub fn pipeline_log_path(&self) -> PathBuf {
        self.job_dir.join("pipeline.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_id() -> JobId {
        "20250614-priya-001".parse().unwrap()
    }

    fn lang(code: &str) -> LanguageCode {
        LanguageCode::new(code).unwrap()
    }

    fn build(workflow: Workflow, targets: Vec<LanguageCode>) -> Result<Job, PipelineError> {
        Job::new(
            job_id(),
            workflow,
            PathBuf::from("/media/film.mkv"),
            lang("hi"),
            targets,
            PathBuf::from("/jobs/20250614-priya-001"),
            None,
            None,
            None,
            false,
        )
    }

    #[test]
    fn test_subtitle_job_with_targets() {
        let job = build(Workflow::Subtitle, vec![lang("en"), lang("gu")]).unwrap();
        assert_eq!(job.target_languages().len(), 2);
        assert_eq!(job.manifest_path(), PathBuf::from("/jobs/20250614-priya-001/manifest.json"));
    }

    #[test]
    fn test_transcribe_rejects_targets() {
        assert!(build(Workflow::Transcribe, vec![lang("en")]).is_err());
        assert!(build(Workflow::Transcribe, vec![]).is_ok());
    }

    #[test]
    fn test_translate_requires_target() {
        assert!(build(Workflow::Translate, vec![]).is_err());
        assert!(build(Workflow::Translate, vec![lang("en")]).is_ok());
    }

    #[test]
    fn test_rejects_auto_and_duplicate_targets() {
        assert!(build(Workflow::Subtitle, vec![LanguageCode::auto()]).is_err());
        assert!(build(Workflow::Subtitle, vec![lang("en"), lang("en")]).is_err());
    }

    #[test]
    fn test_rejects_relative_job_dir() {
        let result = Job::new(
            job_id(),
            Workflow::Transcribe,
            PathBuf::from("/media/film.mkv"),
            lang("en"),
            vec![],
            PathBuf::from("jobs/relative"),
            None,
            None,
            None,
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_inverted_clip_bounds() {
        let result = Job::new(
            job_id(),
            Workflow::Transcribe,
            PathBuf::from("/media/film.mkv"),
            lang("en"),
            vec![],
            PathBuf::from("/jobs/x"),
            Some(60.0),
            Some(30.0),
            None,
            false,
        );
        assert!(result.is_err());
    }
}
