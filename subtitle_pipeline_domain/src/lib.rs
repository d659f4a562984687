// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Subtitle Pipeline Domain
//!
//! Core business logic of the media subtitling pipeline, independent of
//! filesystems, subprocesses, and user interfaces. The domain answers three
//! questions and nothing else:
//!
//! 1. **What is this job?** — [`entities::Job`], [`value_objects::JobId`],
//!    [`value_objects::Workflow`], [`value_objects::LanguageCode`].
//! 2. **What work does it imply?** — the static [`registry`] of twelve
//!    stages and the [`services::workflow_planner`] that prunes them into a
//!    frozen execution plan.
//! 3. **What happened, and can it be reused?** — [`entities::JobManifest`]
//!    with its monotonic per-stage status machine, and the
//!    [`value_objects::MediaFingerprint`] / [`value_objects::StageFingerprint`]
//!    pair that gives every cacheable computation a content-addressed key.
//!
//! ## Invariants Enforced Here
//!
//! - A manifest entry never moves backwards (`pending → running →
//!   terminal`, nothing else).
//! - A stage fingerprint changes whenever the media, the stage, a declared
//!   `fingerprint_extras` value, the model id, or the fan-out language
//!   changes — and only then.
//! - Artifact file names always match `<stage>_<descriptor>.<ext>` and can
//!   never escape their stage directory.
//! - Plans contain only stages whose `mandatory_for` set includes the
//!   workflow, in strictly increasing ordinal order.
//!
//! Everything that touches the outside world — the artifact cache, the
//! stage runner, config files, logging — lives in the `subtitle-pipeline`
//! crate and consumes these types.

pub mod entities;
pub mod error;
pub mod registry;
pub mod services;
pub mod value_objects;

// Re-export commonly used types for convenient access
pub use entities::{CacheSource, Job, JobManifest, JobStatus, StageInvocation, StageStatus};
pub use error::PipelineError;
pub use registry::{OutputSpec, StageDescriptor, StageGate, StageRegistry};
pub use services::{ExecutionPlan, InvocationUnit, PlanDecision, PlanEntry, PlanRequest, WorkflowPlanner};
pub use value_objects::{
    ArtifactFileName, JobId, LanguageCode, MediaFingerprint, NormalizationParams, StageFingerprint, Workflow,
};
