// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Runner
//!
//! Executes one stage invocation as an isolated OS subprocess:
//!
//! ```text
//! <interpreter> <script> --job-dir <abs> --stage-dir <abs> --config <abs-json>
//! ```
//!
//! Running stages out-of-process contains backend faults: certain ML
//! backends (notably the aligner on Apple-silicon accelerators) corrupt
//! process memory *after* producing correct output. In-process, that bug
//! took down the whole pipeline; out-of-process it becomes a classifiable
//! local failure — and for stages marked `isolate`, a crash that left a
//! complete, parsable artifact set behind is reclassified as success.
//!
//! ## Failure Classification
//!
//! | Observation | Classification |
//! |---|---|
//! | exit 0, declared outputs present and parsable | `success` |
//! | exit 0, required outputs missing | `failed (output_missing)` |
//! | non-zero exit, outputs incomplete | `failed (<signal_or_code>)` |
//! | non-zero exit, `isolate` stage, outputs complete | `success (tolerated_post_crash)` |
//! | per-stage timeout exceeded | `failed (timeout)` |
//! | shutdown signal during execution | `failed (cancelled)` |
//!
//! Timeouts and cancellation terminate the child with escalating signals:
//! the polite signal first, then SIGKILL after the grace period.
//!
//! The runner returns a [`StageOutcome`]; it never writes the manifest —
//! that is the orchestrator's job.

use crate::infrastructure::config::JobConfig;
use crate::infrastructure::runtime::environments::EnvironmentRegistry;
use crate::infrastructure::stage_io::StageWorkspace;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use subtitle_pipeline_bootstrap::CancellationToken;
use subtitle_pipeline_domain::{LanguageCode, PipelineError, StageDescriptor};
use tracing::{debug, info, warn};

/// Terminal result of one subprocess invocation.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub error_summary: Option<String>,
    /// Set when the failure was a shutdown request, so the orchestrator
    /// can map the run to the right exit code
    pub cancelled: bool,
}

impl StageOutcome {
    fn success_clean() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            error_summary: None,
            cancelled: false,
        }
    }

    fn failed(exit_code: Option<i32>, summary: String) -> Self {
        Self {
            success: false,
            exit_code,
            error_summary: Some(summary),
            cancelled: false,
        }
    }
}

enum WaitResult {
    Exited(std::process::ExitStatus),
    TimedOut,
    Cancelled(i32),
}

/// Invokes stage programs in their declared execution environments.
pub struct StageRunner {
    registry: EnvironmentRegistry,
    config: Arc<JobConfig>,
}

impl StageRunner {
    pub fn new(registry: EnvironmentRegistry, config: Arc<JobConfig>) -> Self {
        Self { registry, config }
    }

    /// Runs one invocation unit to completion.
    ///
    /// # Errors
    ///
    /// Returns `EnvironmentError` when the interpreter cannot be resolved
    /// or spawned; subprocess failures are reported inside the returned
    /// [`StageOutcome`], not as `Err`.
    pub async fn execute(
        &self,
        workspace: &StageWorkspace,
        lang: Option<&LanguageCode>,
        cancel: &CancellationToken,
    ) -> Result<StageOutcome, PipelineError> {
        let descriptor = workspace.descriptor();

        let snapshot_path = workspace.config_snapshot_path(lang);
        self.write_config_snapshot(&snapshot_path, workspace, lang)?;

        let interpreter = self.registry.interpreter_for(descriptor)?;
        let script = self.registry.script_for(descriptor);

        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(workspace.log_path())?;
        let stderr_file = log_file.try_clone()?;

        debug!(
            stage = descriptor.name,
            interpreter = %interpreter.display(),
            script = %script.display(),
            "spawning stage subprocess"
        );

        let mut child = tokio::process::Command::new(&interpreter)
            .arg(&script)
            .arg("--job-dir")
            .arg(workspace.job_dir())
            .arg("--stage-dir")
            .arg(workspace.stage_dir())
            .arg("--config")
            .arg(&snapshot_path)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(stderr_file))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PipelineError::EnvironmentError(format!(
                    "failed to spawn {} for stage '{}': {}",
                    interpreter.display(),
                    descriptor.name,
                    e
                ))
            })?;

        let timeout = self.config.runner.timeout_for(descriptor.name);
        let grace = Duration::from_secs(self.config.runner.graceful_shutdown_s);

        let wait_result = tokio::select! {
            status = child.wait() => WaitResult::Exited(status?),
            _ = tokio::time::sleep(timeout) => {
                warn!(stage = descriptor.name, timeout_s = timeout.as_secs(), "stage exceeded its timeout");
                Self::terminate(&mut child, 15, grace).await;
                WaitResult::TimedOut
            }
            _ = cancel.cancelled() => {
                let signal = cancel.signal().map(|s| s.as_raw()).unwrap_or(15);
                info!(stage = descriptor.name, signal, "forwarding shutdown signal to stage subprocess");
                Self::terminate(&mut child, signal, grace).await;
                WaitResult::Cancelled(signal)
            }
        };

        self.classify(descriptor, workspace, lang, wait_result, timeout)
    }

    fn classify(
        &self,
        descriptor: &'static StageDescriptor,
        workspace: &StageWorkspace,
        lang: Option<&LanguageCode>,
        wait_result: WaitResult,
        timeout: Duration,
    ) -> Result<StageOutcome, PipelineError> {
        match wait_result {
            WaitResult::Exited(status) if status.success() => {
                if workspace.outputs_complete_and_parsable(lang)? {
                    Ok(StageOutcome::success_clean())
                } else {
                    let missing = workspace.missing_outputs(lang).join(", ");
                    Ok(StageOutcome::failed(
                        Some(0),
                        format!("output_missing: {}", missing),
                    ))
                }
            }
            WaitResult::Exited(status) => {
                let exit_description = Self::describe_exit(&status);
                if self.isolation_effective(descriptor) && workspace.outputs_complete_and_parsable(lang)? {
                    warn!(
                        stage = descriptor.name,
                        exit = %exit_description,
                        "post-output crash tolerated for isolated stage"
                    );
                    return Ok(StageOutcome {
                        success: true,
                        exit_code: status.code(),
                        error_summary: Some(format!("tolerated_post_crash: {}", exit_description)),
                        cancelled: false,
                    });
                }
                let mut summary = exit_description;
                if let Some(reason) = Self::last_log_line(workspace) {
                    summary = format!("{}: {}", summary, reason);
                }
                Ok(StageOutcome::failed(status.code(), summary))
            }
            WaitResult::TimedOut => Ok(StageOutcome::failed(
                None,
                format!("timeout after {}s", timeout.as_secs()),
            )),
            WaitResult::Cancelled(signal) => {
                let name = if signal == 2 { "SIGINT" } else { "SIGTERM" };
                let mut outcome = StageOutcome::failed(None, format!("cancelled ({})", name));
                outcome.cancelled = true;
                Ok(outcome)
            }
        }
    }

    /// Whether the tolerated-crash rule applies to this stage.
    ///
    /// The rule is limited to the alignment stage and configurable there
    /// via `align.isolate_process`.
    fn isolation_effective(&self, descriptor: &StageDescriptor) -> bool {
        if descriptor.name == "alignment" {
            self.config.align.isolate_process
        } else {
            descriptor.isolate
        }
    }

    fn write_config_snapshot(
        &self,
        path: &std::path::Path,
        workspace: &StageWorkspace,
        lang: Option<&LanguageCode>,
    ) -> Result<(), PipelineError> {
        let mut snapshot = serde_json::to_value(self.config.as_ref())?;
        snapshot["invocation"] = serde_json::json!({
            "stage": workspace.descriptor().name,
            "target_language": lang.map(|l| l.as_str()),
            "target_languages": workspace
                .target_languages()
                .iter()
                .map(|l| l.as_str())
                .collect::<Vec<_>>(),
        });
        std::fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
        Ok(())
    }

    fn describe_exit(status: &std::process::ExitStatus) -> String {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return format!("signal {}", signal);
            }
        }
        match status.code() {
            Some(code) => format!("exit {}", code),
            None => "terminated".to_string(),
        }
    }

    /// Last non-empty line of the stage log: the child's one-line failure
    /// reason per the subprocess contract.
    fn last_log_line(workspace: &StageWorkspace) -> Option<String> {
        let content = std::fs::read_to_string(workspace.log_path()).ok()?;
        let line = content.lines().rev().find(|l| !l.trim().is_empty())?.trim();
        let mut line = line.to_string();
        if line.len() > 200 {
            line.truncate(200);
        }
        Some(line)
    }

    /// Sends `signal`, waits out the grace period, then force-kills.
    async fn terminate(child: &mut tokio::process::Child, signal: i32, grace: Duration) {
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            // Forward the polite signal first so the stage can flush.
            unsafe {
                libc::kill(pid as i32, signal);
            }
            let graceful = tokio::time::timeout(grace, child.wait()).await;
            if graceful.is_ok() {
                return;
            }
            warn!(pid, "stage ignored {} for {}s, escalating to SIGKILL", signal, grace.as_secs());
        }
        #[cfg(not(unix))]
        let _ = signal;

        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}
