// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Manifest
//!
//! The manifest is the single authoritative record of a run: job metadata
//! plus one [`StageInvocation`] per invocation unit. It is written only by
//! the orchestrator, persisted after every stage transition, and consulted
//! on resume — a stage whose manifest entry is `success` or `cache_hit` is
//! never re-executed.
//!
//! The entity enforces the status machine: an entry can only be replaced by
//! one whose status is reachable from the current status. This is what
//! makes resume decisions trustworthy after a crash — a `failed` entry can
//! never silently revert to `pending`. Resume instead installs a fresh
//! entry via [`JobManifest::reset_stage`], which is the one sanctioned
//! restart path and only works on re-runnable statuses.

use crate::entities::stage_invocation::{StageInvocation, StageStatus};
use crate::entities::Job;
use crate::services::datetime_serde;
use crate::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Terminal disposition of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Partial,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Partial => "partial",
        };
        write!(f, "{}", s)
    }
}

/// Per-job JSON document at `<job_dir>/manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobManifest {
    job_id: String,
    workflow: String,
    media_path: String,
    source_language: String,
    target_languages: Vec<String>,
    #[serde(with = "datetime_serde")]
    started_at: chrono::DateTime<chrono::Utc>,
    #[serde(with = "datetime_serde")]
    updated_at: chrono::DateTime<chrono::Utc>,
    status: JobStatus,
    stages: BTreeMap<String, StageInvocation>,
}

impl JobManifest {
    /// Creates a fresh manifest for a job with no stage entries.
    pub fn for_job(job: &Job) -> Self {
        let now = chrono::Utc::now();
        Self {
            job_id: job.job_id().to_string(),
            workflow: job.workflow().to_string(),
            media_path: job.media_path().display().to_string(),
            source_language: job.source_language().to_string(),
            target_languages: job.target_languages().iter().map(|l| l.to_string()).collect(),
            started_at: now,
            updated_at: now,
            status: JobStatus::Running,
            stages: BTreeMap::new(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn started_at(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.started_at
    }

    pub fn updated_at(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.updated_at
    }

    /// All stage entries, keyed by invocation-unit name.
    pub fn stages(&self) -> &BTreeMap<String, StageInvocation> {
        &self.stages
    }

    /// Looks up one stage entry.
    pub fn stage(&self, key: &str) -> Option<&StageInvocation> {
        self.stages.get(key)
    }

    /// Whether a stage's outputs are already available (resume check).
    pub fn is_satisfied(&self, key: &str) -> bool {
        self.stages.get(key).map(|s| s.status().is_satisfied()).unwrap_or(false)
    }

    /// Records a stage entry, enforcing the status machine.
    ///
    /// A brand-new entry may arrive in any state reachable from `pending`
    /// in one recorded step (`pending`, `running`, or `skipped` — gate
    /// skips never enter the runner). Replacing an existing entry requires
    /// the new status to be reachable from the recorded one.
    ///
    /// # Errors
    ///
    /// Returns `ManifestViolation` on any back-transition.
    pub fn record_stage(&mut self, invocation: StageInvocation) -> Result<(), PipelineError> {
        let key = invocation.stage().to_string();
        if let Some(existing) = self.stages.get(&key) {
            let from = existing.status();
            let to = invocation.status();
            let legal = from == to && !from.is_terminal();
            if !legal && !from.can_transition_to(to) {
                return Err(PipelineError::ManifestViolation(format!(
                    "stage '{}' cannot move from {} to {}",
                    key, from, to
                )));
            }
        }
        self.stages.insert(key, invocation);
        self.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Replaces a re-runnable entry with a fresh pending one (resume path).
    ///
    /// # Errors
    ///
    /// Returns `ManifestViolation` when the existing entry is `success` or
    /// `cache_hit` — satisfied work is never restarted.
    pub fn reset_stage(&mut self, key: &str) -> Result<(), PipelineError> {
        if let Some(existing) = self.stages.get(key) {
            if existing.status().is_satisfied() {
                return Err(PipelineError::ManifestViolation(format!(
                    "stage '{}' is already {} and cannot be reset",
                    key,
                    existing.status()
                )));
            }
            let ordinal = existing.ordinal();
            self.stages.insert(key.to_string(), StageInvocation::pending(key, ordinal));
            self.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    /// Sets the job-level status and bumps `updated_at`.
    pub fn set_status(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = chrono::Utc::now();
    }

    /// Bumps `updated_at` without changing anything else (no-op resume).
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now();
    }

    /// Whether every key in `planned` is satisfied or skipped.
    pub fn covers(&self, planned: &[String]) -> bool {
        planned.iter().all(|key| {
            self.stages
                .get(key)
                .map(|s| s.status().is_satisfied() || s.status() == StageStatus::Skipped)
                .unwrap_or(false)
        })
    }

    /// Number of cache-hit invocations recorded.
    pub fn cache_hit_count(&self) -> usize {
        self.stages
            .values()
            .filter(|s| s.status() == StageStatus::CacheHit)
            .count()
    }
}
