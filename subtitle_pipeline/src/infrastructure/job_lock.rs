// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Directory Lock
//!
//! Two orchestrators sharing one job directory is undefined behavior, so
//! `run` takes an exclusive advisory lock before touching the manifest.
//! The lock is a `.lock` file created with `create_new` (O_EXCL) holding
//! the owner's pid. A lock whose pid no longer exists is stale — left by
//! a killed orchestrator — and is reclaimed.

use std::path::{Path, PathBuf};
use subtitle_pipeline_domain::PipelineError;
use tracing::warn;

/// File name of the lock inside the job directory.
pub const LOCK_FILE: &str = ".lock";

/// Held lock on one job directory; released on drop.
#[derive(Debug)]
pub struct JobLock {
    path: PathBuf,
}

impl JobLock {
    /// Acquires the lock or fails with `JobLocked`.
    pub fn acquire(job_dir: &Path) -> Result<Self, PipelineError> {
        let path = job_dir.join(LOCK_FILE);

        for _ in 0..2 {
            match std::fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    use std::io::Write;
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let holder = std::fs::read_to_string(&path).unwrap_or_default();
                    match holder.trim().parse::<u32>() {
                        Ok(pid) if Self::process_alive(pid) => {
                            return Err(PipelineError::JobLocked(format!(
                                "{} is held by running pid {}",
                                path.display(),
                                pid
                            )));
                        }
                        _ => {
                            warn!(lock = %path.display(), "reclaiming stale job lock");
                            let _ = std::fs::remove_file(&path);
                            // retry the create_new
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(PipelineError::JobLocked(format!(
            "could not acquire {} after reclaiming a stale lock",
            path.display()
        )))
    }

    #[cfg(unix)]
    fn process_alive(pid: u32) -> bool {
        // kill(pid, 0) probes existence without signaling
        unsafe { libc::kill(pid as i32, 0) == 0 }
    }

    #[cfg(not(unix))]
    fn process_alive(_pid: u32) -> bool {
        // No cheap probe; assume alive and let the operator delete the lock.
        true
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
