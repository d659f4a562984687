// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the error system for the subtitling pipeline domain.
//! Failures are categorized so the orchestrator can decide between abort,
//! continue, and re-execute without inspecting error message text.
//!
//! ## Error Categories
//!
//! - **Input errors** — unreadable media, malformed job descriptors, invalid
//!   configuration. The orchestrator refuses to start any stage.
//! - **Stage errors** — a stage subprocess failed, timed out, or produced an
//!   incomplete artifact set. Recovery is an operator resume.
//! - **Cache errors** — a cache entry failed its integrity check. The entry
//!   is deleted and the stage re-executes as a miss.
//! - **Infrastructure errors** — filesystem I/O, serialization, environment
//!   resolution.
//! - **Lifecycle errors** — cancellation, manifest state violations, lock
//!   contention on a job directory.
//!
//! ## Propagation Policy
//!
//! Errors are classified at the runner/cache boundary and recorded in the
//! manifest as one-line summaries. No stack traces cross a process boundary;
//! the child's stderr is preserved in the per-stage log instead.

use thiserror::Error;

/// Domain-specific errors for the subtitling pipeline.
///
/// Each variant carries a descriptive message with enough context to act on.
/// Variants map onto the error taxonomy used by the orchestrator's
/// continuation policy: some are terminal for the run, some fail a single
/// stage, and some are absorbed (cache corruption re-executes as a miss).
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Media unreadable: {0}")]
    MediaUnreadable(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Stage failed: {0}")]
    StageFailed(String),

    #[error("Stage timed out: {0}")]
    StageTimedOut(String),

    #[error("Cache corrupt: {0}")]
    CacheCorrupt(String),

    #[error("Environment error: {0}")]
    EnvironmentError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Manifest violation: {0}")]
    ManifestViolation(String),

    #[error("Job directory locked: {0}")]
    JobLocked(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl PipelineError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new media-unreadable error
    pub fn media_unreadable(msg: impl Into<String>) -> Self {
        Self::MediaUnreadable(msg.into())
    }

    /// Creates a new stage failure error
    pub fn stage_failed(msg: impl Into<String>) -> Self {
        Self::StageFailed(msg.into())
    }

    /// Creates a new stage timeout error
    pub fn stage_timed_out(msg: impl Into<String>) -> Self {
        Self::StageTimedOut(msg.into())
    }

    /// Creates a new cache corruption error
    pub fn cache_corrupt(msg: impl Into<String>) -> Self {
        Self::CacheCorrupt(msg.into())
    }

    /// Creates a new IO error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::IoError(msg.into())
    }

    /// Creates a new validation error
    pub fn validation_error(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Creates a new cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Checks if the error is recoverable by an operator resume
    ///
    /// A recoverable error leaves the job directory in a state where a
    /// subsequent `run --resume` can pick up from the failed stage.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::StageFailed(_)
                | PipelineError::StageTimedOut(_)
                | PipelineError::CacheCorrupt(_)
                | PipelineError::IoError(_)
                | PipelineError::Cancelled(_)
        )
    }

    /// Checks if the error occurred before any stage could run
    ///
    /// These map to the `failed-before-first-stage` exit code.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidConfiguration(_)
                | PipelineError::MediaUnreadable(_)
                | PipelineError::JobNotFound(_)
                | PipelineError::JobLocked(_)
        )
    }

    /// Gets the error category
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::InvalidConfiguration(_) => "configuration",
            PipelineError::MediaUnreadable(_) => "input",
            PipelineError::JobNotFound(_) => "input",
            PipelineError::StageFailed(_) => "stage",
            PipelineError::StageTimedOut(_) => "timeout",
            PipelineError::CacheCorrupt(_) => "cache",
            PipelineError::EnvironmentError(_) => "environment",
            PipelineError::IoError(_) => "io",
            PipelineError::SerializationError(_) => "serialization",
            PipelineError::ValidationError(_) => "validation",
            PipelineError::ManifestViolation(_) => "manifest",
            PipelineError::JobLocked(_) => "lock",
            PipelineError::Cancelled(_) => "cancellation",
            PipelineError::InternalError(_) => "internal",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}
