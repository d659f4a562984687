// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Show Status Use Case
//!
//! Prints the operator view of one job: the manifest's job-level status
//! and a per-stage table with durations, cache participation, and — for
//! anything that is not `success` — the one-line reason and the path to
//! the stage log.

use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::manifest_store::ManifestStore;
use anyhow::Result;
use std::path::Path;
use subtitle_pipeline_domain::{JobId, PipelineError, StageStatus};

/// Use case behind `subtitle-pipeline status`.
pub struct ShowStatusUseCase;

impl ShowStatusUseCase {
    pub fn execute(defaults_file: Option<&Path>, job_id: &str) -> Result<()> {
        let job_id: JobId = job_id.parse()?;
        let config = ConfigLoader::load(defaults_file, None)?;
        let job_dir = config.jobs.root.join(job_id.as_str());
        let store = ManifestStore::new(job_dir.join("manifest.json"));
        if !store.exists() {
            return Err(PipelineError::JobNotFound(format!(
                "job '{}' has no manifest (never run?)",
                job_id
            ))
            .into());
        }
        let manifest = store.load()?;

        println!("job:       {}", manifest.job_id());
        println!("workflow:  {}", manifest.workflow());
        println!("status:    {}", manifest.status());
        println!("updated:   {}", manifest.updated_at().to_rfc3339());
        println!();
        println!(
            "{:<4} {:<24} {:<10} {:>9}  {:<7} {}",
            "ord", "stage", "status", "time", "cache", "detail"
        );

        let mut rows: Vec<_> = manifest.stages().values().collect();
        rows.sort_by_key(|inv| (inv.ordinal(), inv.stage().to_string()));
        for inv in rows {
            let cache = inv
                .cache_source()
                .map(|c| format!("{:?}", c).to_lowercase())
                .unwrap_or_else(|| "-".to_string());
            let detail = match inv.status() {
                StageStatus::Success | StageStatus::CacheHit => inv.error_summary().unwrap_or("").to_string(),
                _ => {
                    let mut detail = inv.error_summary().unwrap_or("").to_string();
                    if let Some(log) = inv.log_path() {
                        if !detail.is_empty() {
                            detail.push_str("  ");
                        }
                        detail.push_str(log);
                    }
                    detail
                }
            };
            println!(
                "{:<4} {:<24} {:<10} {:>8.1}s  {:<7} {}",
                format!("{:02}", inv.ordinal()),
                inv.stage(),
                inv.status().to_string(),
                inv.duration_s(),
                cache,
                detail
            );
        }
        Ok(())
    }
}
