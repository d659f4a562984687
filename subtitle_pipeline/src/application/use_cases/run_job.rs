// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Run Job Use Case
//!
//! Drives the orchestrator for one prepared job: loads the descriptor and
//! layered configuration, takes the job-directory lock, wires up logging
//! and the stage runner, runs to a terminal status, prints the run
//! summary, and maps the outcome onto the CLI exit-code contract
//! (0 completed, 2 partial, 3 failed-before-first-stage, 130/143
//! cancelled).

use crate::application::services::{CacheCoordinator, Orchestrator, RunSummary};
use crate::infrastructure::config::{ConfigLoader, JobDescriptor};
use crate::infrastructure::job_lock::JobLock;
use crate::infrastructure::logging;
use crate::infrastructure::runtime::{EnvironmentRegistry, StageRunner};
use std::path::Path;
use std::sync::Arc;
use subtitle_pipeline_bootstrap::{CancellationToken, ExitCode, ShutdownSignal};
use subtitle_pipeline_domain::{JobId, JobStatus, PipelineError};
use tracing::{error, info};

/// Use case behind `subtitle-pipeline run`.
pub struct RunJobUseCase;

impl RunJobUseCase {
    /// Executes a prepared job and returns the process exit code.
    pub async fn execute(
        defaults_file: Option<&Path>,
        job_id: &str,
        debug: bool,
        resume: bool,
        cancel: CancellationToken,
    ) -> ExitCode {
        match Self::run_inner(defaults_file, job_id, debug, resume, &cancel).await {
            Ok(summary) => {
                Self::display_summary(job_id, &summary);
                match summary.status {
                    JobStatus::Completed => ExitCode::Completed,
                    JobStatus::Partial if summary.cancelled => match cancel.signal() {
                        Some(ShutdownSignal::Terminate) => ExitCode::Terminated,
                        _ => ExitCode::Interrupted,
                    },
                    JobStatus::Partial => ExitCode::Partial,
                    JobStatus::Failed | JobStatus::Running => ExitCode::Partial,
                }
            }
            Err(e) => {
                // run_inner only errs before the first stage; everything
                // after that terminates through the summary path.
                error!("run failed before any stage could execute: {}", e);
                eprintln!("error: {}", e);
                ExitCode::InputInvalid
            }
        }
    }

    async fn run_inner(
        defaults_file: Option<&Path>,
        job_id: &str,
        debug: bool,
        resume: bool,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, PipelineError> {
        let job_id: JobId = job_id.parse()?;

        // Bootstrap configuration (jobs root) comes from the defaults
        // layers alone; the descriptor's overrides join once it is loaded.
        let bootstrap_config = ConfigLoader::load(defaults_file, None)?;
        let job_dir = bootstrap_config.jobs.root.join(job_id.as_str());
        if !job_dir.exists() {
            return Err(PipelineError::JobNotFound(format!(
                "no job directory at {}",
                job_dir.display()
            )));
        }
        let job_dir = job_dir.canonicalize()?;

        let descriptor = JobDescriptor::load(&job_dir)?;
        let config = Arc::new(ConfigLoader::load(defaults_file, descriptor.overrides.as_ref())?);
        let job = descriptor.to_job(&job_dir)?;

        logging::init_job_logging(&job.pipeline_log_path(), debug || job.debug())?;
        if resume {
            info!(job_id = %job.job_id(), "resume requested");
        }

        let _lock = JobLock::acquire(&job_dir)?;

        let registry = EnvironmentRegistry::load(
            &config.runner.environments_file,
            config.runner.stages_root.clone(),
        )?;
        let runner = StageRunner::new(registry, config.clone());
        let cache = CacheCoordinator::new(config.clone());

        let orchestrator = Orchestrator::new(job, config, runner, cache, cancel.clone());
        orchestrator.run().await
    }

    /// Prints the job-level summary to stdout.
    fn display_summary(job_id: &str, summary: &RunSummary) {
        println!();
        println!("RUN SUMMARY  {}", job_id);
        let status_line = format!(
            "status: {} | {:.1}s | {} executed | {} cache hits | {} bytes restored",
            summary.status,
            summary.total_duration_s,
            summary.units_executed,
            summary.cache_hits,
            summary.bytes_restored,
        );
        let width = status_line.len() + 2;
        println!("┌{}┐", "─".repeat(width));
        println!("│ {} │", status_line);
        println!("└{}┘", "─".repeat(width));
        if let Some((unit, reason, log_path)) = &summary.failure {
            println!("failed stage:  {}", unit);
            println!("reason:        {}", reason);
            println!("stage log:     {}", log_path);
            println!();
            println!("The job is resumable: re-run with the same --job-id to continue.");
        }
    }
}
