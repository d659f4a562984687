// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Invocation Record
//!
//! The per-job runtime record of one stage execution (or one per-language
//! fan-out unit of the translation stage). Created when a stage enters the
//! runner, terminated by the runner, recorded into the manifest by the
//! orchestrator — the runner itself never touches the manifest.
//!
//! ## Status Machine
//!
//! ```text
//! pending ──► running ──► success | failed | cache_hit | skipped
//! ```
//!
//! Transitions advance only along those edges. No back-transitions, no
//! skipping `running`: even a cache hit passes through `running` while the
//! restore is in flight, so an interrupted restore resumes as a re-run.

use crate::services::datetime_serde;
use crate::value_objects::StageFingerprint;
use serde::{Deserialize, Serialize};

/// Lifecycle state of one stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
    CacheHit,
}

impl StageStatus {
    /// Whether the stage reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StageStatus::Pending | StageStatus::Running)
    }

    /// Whether the stage's outputs can be consumed downstream.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, StageStatus::Success | StageStatus::CacheHit)
    }

    /// Validates a status transition along the allowed edges.
    pub fn can_transition_to(&self, next: StageStatus) -> bool {
        match self {
            StageStatus::Pending => matches!(next, StageStatus::Running),
            StageStatus::Running => next.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Success => "success",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
            StageStatus::CacheHit => "cache_hit",
        };
        write!(f, "{}", s)
    }
}

/// How the artifact cache participated in an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
    /// Cache consulted, nothing found; stage executed
    Miss,
    /// Outputs restored from the cache; stage not executed
    Hit,
    /// Stage executed and its outputs were stored
    Stored,
}

/// Runtime record of one stage invocation.
///
/// The `stage` field is the manifest key: the stage name, or
/// `<name>.<lang>` for per-language fan-out units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageInvocation {
    stage: String,
    ordinal: u8,
    status: StageStatus,
    #[serde(with = "datetime_serde::optional")]
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(with = "datetime_serde::optional")]
    ended_at: Option<chrono::DateTime<chrono::Utc>>,
    duration_s: f64,
    exit_code: Option<i32>,
    #[serde(rename = "outputs")]
    output_files: Vec<String>,
    log_path: Option<String>,
    fingerprint: Option<StageFingerprint>,
    cache_source: Option<CacheSource>,
    error_summary: Option<String>,
}

impl StageInvocation {
    /// Creates a pending invocation record.
    pub fn pending(stage: impl Into<String>, ordinal: u8) -> Self {
        Self {
            stage: stage.into(),
            ordinal,
            status: StageStatus::Pending,
            started_at: None,
            ended_at: None,
            duration_s: 0.0,
            exit_code: None,
            output_files: Vec::new(),
            log_path: None,
            fingerprint: None,
            cache_source: None,
            error_summary: None,
        }
    }

    /// Creates a terminal `skipped` record with a reason.
    ///
    /// Gate-skipped stages never enter the runner, so the record passes
    /// through `running` in one step when written to the manifest.
    pub fn skipped(stage: impl Into<String>, ordinal: u8, reason: impl Into<String>) -> Self {
        let mut inv = Self::pending(stage, ordinal);
        inv.status = StageStatus::Skipped;
        inv.error_summary = Some(reason.into());
        inv
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn ordinal(&self) -> u8 {
        self.ordinal
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<&chrono::DateTime<chrono::Utc>> {
        self.started_at.as_ref()
    }

    pub fn ended_at(&self) -> Option<&chrono::DateTime<chrono::Utc>> {
        self.ended_at.as_ref()
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn output_files(&self) -> &[String] {
        &self.output_files
    }

    pub fn log_path(&self) -> Option<&str> {
        self.log_path.as_deref()
    }

    pub fn fingerprint(&self) -> Option<&StageFingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn cache_source(&self) -> Option<CacheSource> {
        self.cache_source
    }

    pub fn error_summary(&self) -> Option<&str> {
        self.error_summary.as_deref()
    }

    /// Marks the invocation as running and stamps the start time.
    pub fn mark_running(&mut self) {
        self.status = StageStatus::Running;
        self.started_at = Some(chrono::Utc::now());
    }

    /// Records the cache fingerprint computed for this invocation.
    pub fn set_fingerprint(&mut self, fingerprint: StageFingerprint) {
        self.fingerprint = Some(fingerprint);
    }

    /// Records the per-stage log file location.
    pub fn set_log_path(&mut self, path: impl Into<String>) {
        self.log_path = Some(path.into());
    }

    /// Terminates the invocation with a final status.
    ///
    /// Stamps the end time and wall-clock duration from `started_at`.
    pub fn finish(
        &mut self,
        status: StageStatus,
        exit_code: Option<i32>,
        output_files: Vec<String>,
        error_summary: Option<String>,
    ) {
        let ended = chrono::Utc::now();
        self.duration_s = self
            .started_at
            .map(|s| (ended - s).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);
        self.ended_at = Some(ended);
        self.status = status;
        self.exit_code = exit_code;
        self.output_files = output_files;
        self.error_summary = error_summary;
    }

    /// Records how the cache participated.
    pub fn set_cache_source(&mut self, source: CacheSource) {
        self.cache_source = Some(source);
    }
}
