// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Orchestrator
//!
//! Top-level driver of one pipeline run. The orchestrator owns the
//! manifest (single writer), iterates the frozen plan strictly
//! sequentially, and routes each invocation unit through the cache
//! coordinator and the stage runner:
//!
//! ```text
//! plan ──► for each unit:
//!            manifest says satisfied? ── yes ──► skip (resume)
//!            cache HIT? ── yes ──► restore, record cache_hit
//!            MISS ──► runner ──► classify ──► store outputs
//!          ──► update manifest, fsync
//! ```
//!
//! ## Failure Policy
//!
//! A failed required unit stops the run with `partial`; a failed
//! soft-failable stage gets empty artifacts written in its place and the
//! run continues. No silent retries anywhere: a transient error is a
//! failed stage and an operator resume.
//!
//! ## Resume
//!
//! A second invocation with the same job id loads the manifest, exits
//! early when the job already completed, and otherwise continues from the
//! first unsatisfied unit. Failed or interrupted entries are reset to
//! `pending` through the manifest's one sanctioned restart path, so the
//! status machine stays monotonic within each run.
//!
//! ## Cancellation
//!
//! On SIGINT/SIGTERM the runner forwards the signal to the current
//! subprocess, waits out the grace period, escalates, and the unit is
//! recorded `failed (cancelled)`; a later resume picks up from exactly
//! that unit.

use crate::application::services::cache_coordinator::CacheCoordinator;
use crate::infrastructure::config::JobConfig;
use crate::infrastructure::identity::MediaIdentity;
use crate::infrastructure::logging;
use crate::infrastructure::manifest_store::ManifestStore;
use crate::infrastructure::runtime::StageRunner;
use crate::infrastructure::stage_io::StageWorkspace;
use std::sync::Arc;
use std::time::Instant;
use subtitle_pipeline_bootstrap::CancellationToken;
use subtitle_pipeline_domain::{
    CacheSource, InvocationUnit, Job, JobManifest, JobStatus, LanguageCode, MediaFingerprint, PipelineError,
    PlanRequest, StageInvocation, StageStatus, WorkflowPlanner,
};
use tracing::{debug, info, warn};

/// Job-level result handed back to the CLI.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub status: JobStatus,
    pub total_duration_s: f64,
    pub units_executed: usize,
    pub cache_hits: usize,
    pub bytes_restored: u64,
    pub cancelled: bool,
    /// (unit key, one-line summary, log path) of the stopping failure
    pub failure: Option<(String, String, String)>,
}

impl RunSummary {
    fn new(status: JobStatus) -> Self {
        Self {
            status,
            total_duration_s: 0.0,
            units_executed: 0,
            cache_hits: 0,
            bytes_restored: 0,
            cancelled: false,
            failure: None,
        }
    }
}

/// Top-level driver for one job.
pub struct Orchestrator {
    job: Job,
    config: Arc<JobConfig>,
    manifest_store: ManifestStore,
    runner: StageRunner,
    cache: CacheCoordinator,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        job: Job,
        config: Arc<JobConfig>,
        runner: StageRunner,
        cache: CacheCoordinator,
        cancel: CancellationToken,
    ) -> Self {
        let manifest_store = ManifestStore::new(job.manifest_path());
        Self {
            job,
            config,
            manifest_store,
            runner,
            cache,
            cancel,
        }
    }

    /// Runs the job to a terminal status.
    ///
    /// # Errors
    ///
    /// Propagates only failures that occur before any stage could run
    /// (unreadable media, malformed config, unwritable manifest); stage
    /// failures terminate with a `partial` summary instead.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let job_id = self.job.job_id().to_string();

        // Resume fast-path: a completed job is a no-op apart from the
        // bumped updated_at.
        if self.manifest_store.exists() {
            let mut manifest = self.manifest_store.load()?;
            if manifest.status() == JobStatus::Completed {
                info!(%job_id, step = logging::next_step(), "job already completed; nothing to do");
                manifest.touch();
                self.manifest_store.save(&manifest)?;
                let mut summary = RunSummary::new(JobStatus::Completed);
                summary.total_duration_s = started.elapsed().as_secs_f64();
                summary.cache_hits = manifest.cache_hit_count();
                return Ok(summary);
            }
        }

        let plan = WorkflowPlanner::plan(&self.plan_request())?;
        for warning in plan.warnings() {
            warn!(%job_id, step = logging::next_step(), "{}", warning);
        }

        // Media identity comes before any stage or manifest mutation: an
        // unreadable input must fail the run before the first stage.
        let media = MediaIdentity::fingerprint(
            self.job.media_path(),
            &self.config.normalization_params(),
            self.job.media_duration(),
        )?;
        debug!(
            %job_id,
            content_hash = &media.content_hash()[..12],
            "media fingerprint computed"
        );

        let mut manifest = if self.manifest_store.exists() {
            self.manifest_store.load()?
        } else {
            JobManifest::for_job(&self.job)
        };
        manifest.set_status(JobStatus::Running);

        // Gate-skipped stages are part of the record: the manifest says
        // why a stage did not run, not merely that it did not.
        for (entry, reason) in plan.skipped() {
            if manifest.stage(entry.descriptor.name).is_none() {
                info!(
                    %job_id,
                    stage = entry.descriptor.name,
                    step = logging::next_step(),
                    "stage skipped: {}",
                    reason
                );
                manifest.record_stage(StageInvocation::skipped(
                    entry.descriptor.name,
                    entry.descriptor.ordinal,
                    reason,
                ))?;
            }
        }
        self.manifest_store.save(&manifest)?;

        let mut summary = RunSummary::new(JobStatus::Running);
        let units = plan.invocation_units();
        info!(
            %job_id,
            workflow = %plan.workflow(),
            units = units.len(),
            step = logging::next_step(),
            "plan frozen, starting execution"
        );

        for unit in &units {
            let key = unit.manifest_key();

            if manifest.is_satisfied(&key) {
                debug!(%job_id, unit = %key, "already satisfied, resuming past it");
                continue;
            }
            if self.cancel.is_cancelled() {
                info!(%job_id, step = logging::next_step(), "shutdown requested between stages");
                summary.cancelled = true;
                summary.status = JobStatus::Partial;
                manifest.set_status(JobStatus::Partial);
                self.manifest_store.save(&manifest)?;
                summary.total_duration_s = started.elapsed().as_secs_f64();
                return Ok(summary);
            }

            // A leftover failed/interrupted entry from a previous run is
            // replaced by a fresh pending one.
            if manifest.stage(&key).is_some() {
                manifest.reset_stage(&key)?;
            }

            let stopped = self
                .execute_unit(unit, &key, &media, plan.effective_targets(), &mut manifest, &mut summary)
                .await?;
            if stopped {
                manifest.set_status(JobStatus::Partial);
                self.manifest_store.save(&manifest)?;
                summary.status = JobStatus::Partial;
                summary.total_duration_s = started.elapsed().as_secs_f64();
                return Ok(summary);
            }
        }

        manifest.set_status(JobStatus::Completed);
        self.manifest_store.save(&manifest)?;
        summary.status = JobStatus::Completed;
        summary.total_duration_s = started.elapsed().as_secs_f64();
        info!(
            %job_id,
            step = logging::next_step(),
            executed = summary.units_executed,
            cache_hits = summary.cache_hits,
            bytes_restored = summary.bytes_restored,
            "job completed"
        );
        Ok(summary)
    }

    /// Drives one invocation unit to a terminal manifest entry.
    ///
    /// Returns `true` when the run must stop (required failure or
    /// cancellation).
    #[allow(clippy::too_many_arguments)]
    async fn execute_unit(
        &self,
        unit: &InvocationUnit,
        key: &str,
        media: &MediaFingerprint,
        effective_targets: &[LanguageCode],
        manifest: &mut JobManifest,
        summary: &mut RunSummary,
    ) -> Result<bool, PipelineError> {
        let job_id = self.job.job_id().to_string();
        let descriptor = unit.descriptor;
        let workspace = StageWorkspace::create(self.job.job_dir(), descriptor, effective_targets)?;

        let mut invocation = StageInvocation::pending(key, descriptor.ordinal);
        invocation.set_log_path(workspace.log_path().display().to_string());
        manifest.record_stage(invocation.clone())?;
        self.manifest_store.save(manifest)?;

        invocation.mark_running();
        manifest.record_stage(invocation.clone())?;
        self.manifest_store.save(manifest)?;
        info!(
            %job_id,
            unit = key,
            ordinal = descriptor.ordinal,
            step = logging::next_step(),
            "stage started"
        );

        let fingerprint = self.cache.fingerprint_for(media, unit);
        if let Some(fp) = &fingerprint {
            invocation.set_fingerprint(fp.clone());
        }

        // HIT path: restore and we are done; downstream sees the stage as
        // if it had run.
        if let Some(fp) = &fingerprint {
            if let Some(entry) = self.cache.try_restore(unit, fp, &workspace)? {
                summary.cache_hits += 1;
                summary.bytes_restored += entry.total_size();
                invocation.set_cache_source(CacheSource::Hit);
                let outputs = Self::output_names(&workspace, unit);
                invocation.finish(StageStatus::CacheHit, None, outputs, None);
                manifest.record_stage(invocation)?;
                self.manifest_store.save(manifest)?;
                return Ok(false);
            }
            invocation.set_cache_source(CacheSource::Miss);
        }

        // MISS path: execute. Runner-level errors (unresolvable
        // interpreter, spawn failure) classify as stage failures so the
        // manifest stays authoritative.
        let outcome = match self.runner.execute(&workspace, unit.language.as_ref(), &self.cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%job_id, unit = key, "stage could not be launched: {}", e);
                invocation.finish(StageStatus::Failed, None, vec![], Some(e.to_string()));
                let failure = (
                    key.to_string(),
                    e.to_string(),
                    workspace.log_path().display().to_string(),
                );
                manifest.record_stage(invocation)?;
                self.manifest_store.save(manifest)?;
                summary.failure = Some(failure);
                return Ok(true);
            }
        };

        if outcome.success {
            if let Some(fp) = &fingerprint {
                if self.cache.store_outputs(unit, fp, &workspace, self.job.job_id().as_str()) {
                    invocation.set_cache_source(CacheSource::Stored);
                }
            }
            if descriptor.may_write_job_root {
                self.promote_job_root_outputs(&workspace, unit);
            }
            summary.units_executed += 1;
            let outputs = Self::output_names(&workspace, unit);
            info!(
                %job_id,
                unit = key,
                step = logging::next_step(),
                outputs = outputs.len(),
                "stage succeeded"
            );
            invocation.finish(StageStatus::Success, outcome.exit_code, outputs, outcome.error_summary);
            manifest.record_stage(invocation)?;
            self.manifest_store.save(manifest)?;
            return Ok(false);
        }

        if descriptor.soft_failable && !outcome.cancelled {
            // OptionalStageFailed: empty artifacts stand in for the bundle
            // and the run proceeds.
            warn!(
                %job_id,
                unit = key,
                step = logging::next_step(),
                "optional stage failed, writing empty artifacts: {}",
                outcome.error_summary.as_deref().unwrap_or("unknown")
            );
            self.write_empty_outputs(&workspace, unit)?;
            let outputs = Self::output_names(&workspace, unit);
            invocation.finish(StageStatus::Failed, outcome.exit_code, outputs, outcome.error_summary);
            manifest.record_stage(invocation)?;
            self.manifest_store.save(manifest)?;
            return Ok(false);
        }

        let summary_line = outcome.error_summary.clone().unwrap_or_else(|| "failed".to_string());
        warn!(
            %job_id,
            unit = key,
            step = logging::next_step(),
            "stage failed: {}",
            summary_line
        );
        invocation.finish(StageStatus::Failed, outcome.exit_code, vec![], outcome.error_summary);
        manifest.record_stage(invocation)?;
        self.manifest_store.save(manifest)?;
        summary.cancelled = outcome.cancelled;
        summary.failure = Some((
            key.to_string(),
            summary_line,
            workspace.log_path().display().to_string(),
        ));
        Ok(true)
    }

    fn plan_request(&self) -> PlanRequest {
        PlanRequest {
            workflow: self.job.workflow(),
            source_language: self.job.source_language().clone(),
            target_languages: self.job.target_languages().to_vec(),
            source_separation_enabled: self.config.source_separation.enabled,
            indic_languages: self.config.languages.indic.clone(),
        }
    }

    fn output_names(workspace: &StageWorkspace, unit: &InvocationUnit) -> Vec<String> {
        workspace
            .snapshot_outputs(unit.language.as_ref())
            .into_iter()
            .map(|(_, path)| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
            .collect()
    }

    /// The one exception to stage-directory confinement: the final mux
    /// stage emits into the job root. The subprocess still writes into
    /// its own directory per the stage contract; the orchestrator copies
    /// the container up so the job's deliverable sits next to the
    /// manifest. Promotion failure is logged, not fatal — the stage
    /// directory remains the authoritative location.
    fn promote_job_root_outputs(&self, workspace: &StageWorkspace, unit: &InvocationUnit) {
        for (logical, path) in workspace.snapshot_outputs(unit.language.as_ref()) {
            let Some(file_name) = path.file_name() else {
                continue;
            };
            let dest = self.job.job_dir().join(file_name);
            match std::fs::copy(&path, &dest) {
                Ok(_) => info!(
                    artifact = logical.as_str(),
                    dest = %dest.display(),
                    "final container promoted into the job root"
                ),
                Err(e) => warn!(
                    artifact = logical.as_str(),
                    "failed to promote {} into the job root: {}",
                    path.display(),
                    e
                ),
            }
        }
    }

    /// Writes empty stand-in artifacts for a soft-failed stage so
    /// downstream consumers find their declared inputs.
    fn write_empty_outputs(&self, workspace: &StageWorkspace, unit: &InvocationUnit) -> Result<(), PipelineError> {
        for name in workspace.missing_outputs(unit.language.as_ref()) {
            let path = workspace.open_output(&name)?;
            let content: &[u8] = if name.ends_with(".json") { b"{}" } else { b"" };
            std::fs::write(path, content)?;
        }
        Ok(())
    }
}
