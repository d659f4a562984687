// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Logging
//!
//! Structured logging for the orchestrator process, built on `tracing`.
//! Three sinks exist:
//!
//! 1. **Per-job aggregate** — `<job_dir>/pipeline.log`, plain text, no
//!    ANSI, every level.
//! 2. **Standard error** — INFO by default, DEBUG when the job or the
//!    `run --debug` flag asks for it; `PIPELINE_LOG_LEVEL` overrides both.
//! 3. **Per-stage files** — `<stage_dir>/stage.log`, written by the stage
//!    runner from the child's stdout/stderr rather than through tracing
//!    (the child is another process; its bytes are evidence, not events).
//!
//! Orchestrator records carry `job_id`, `stage`, and a monotonic step
//! counter so interleaved resumes remain ordered in the aggregate log.
//! Diagnostics never go through `print!`; stdout is reserved for the
//! user-facing run summary.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use subtitle_pipeline_domain::PipelineError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Environment variable overriding the stderr log level.
pub const LOG_LEVEL_ENV: &str = "PIPELINE_LOG_LEVEL";

static STEP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Next value of the process-wide monotonic step counter.
///
/// Attached to orchestrator log records so events stay totally ordered
/// even when wall-clock timestamps collide.
pub fn next_step() -> u64 {
    STEP_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A cloneable writer funneling a layer's output into one shared file.
#[derive(Clone)]
struct SharedFileWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl std::io::Write for SharedFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.lock().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.lock().flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedFileWriter {
    type Writer = SharedFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Initializes the global subscriber for one `run` invocation.
///
/// Idempotent: a second call (tests, resumed runs in-process) is a no-op
/// because the global default can only be installed once.
pub fn init_job_logging(pipeline_log: &Path, debug: bool) -> Result<(), PipelineError> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(pipeline_log)?;
    let file_writer = SharedFileWriter {
        file: Arc::new(Mutex::new(file)),
    };

    let stderr_level = if debug { "debug" } else { "info" };
    let stderr_filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(stderr_level));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(file_writer)
        .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    // try_init so tests and repeated invocations do not panic
    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init();
    Ok(())
}

/// Initializes plain stderr logging for commands without a job directory
/// (`prepare`, `status`, `cache-gc`).
pub fn init_process_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
