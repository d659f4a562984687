// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Common Test Helpers
//!
//! Shared fixture for integration and end-to-end tests: a temporary
//! pipeline installation whose twelve stages are small `/bin/sh` programs
//! that honor the stage subprocess contract — they read the standardized
//! argv, log their invocation, and write their declared outputs into the
//! stage directory. Tests swap individual scripts to inject failures,
//! crashes, and hangs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use subtitle_pipeline::application::services::{CacheCoordinator, Orchestrator, RunSummary};
use subtitle_pipeline::infrastructure::config::JobConfig;
use subtitle_pipeline::infrastructure::manifest_store::ManifestStore;
use subtitle_pipeline::infrastructure::runtime::{EnvironmentRegistry, StageRunner};
use subtitle_pipeline_bootstrap::{CancellationToken, ShutdownCoordinator};
use subtitle_pipeline_domain::{Job, JobId, JobManifest, LanguageCode, StageRegistry, Workflow};

/// Hex-encoded SHA-256 of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// A disposable pipeline installation plus one prepared job.
pub struct PipelineFixture {
    pub root: tempfile::TempDir,
    pub root_path: PathBuf,
    pub config: Arc<JobConfig>,
    pub job: Job,
}

impl PipelineFixture {
    /// Builds a fixture with working default scripts for all twelve
    /// stages and one prepared job.
    pub fn new(workflow: Workflow, source: &str, targets: &[&str]) -> Self {
        let root = tempfile::tempdir().expect("fixture tempdir");
        let root_path = root.path().canonicalize().expect("canonical fixture root");

        let media_path = root_path.join("media.mkv");
        // deterministic content so cache identity is stable across jobs
        std::fs::write(&media_path, vec![0xabu8; 4096]).expect("write media");

        let stages_dir = root_path.join("stages");
        std::fs::create_dir_all(&stages_dir).expect("stages dir");
        let invocations_log = root_path.join("invocations.log");
        for descriptor in StageRegistry::all() {
            let script = default_script(descriptor.name, &invocations_log, targets);
            std::fs::write(stages_dir.join(format!("{}.sh", descriptor.name)), script).expect("stage script");
        }

        let environments_file = root_path.join("environments.toml");
        std::fs::write(&environments_file, environments_toml(&stages_dir)).expect("environments file");

        let mut config = JobConfig::default();
        config.jobs.root = root_path.join("jobs");
        config.cache.root = root_path.join("cache");
        config.runner.environments_file = environments_file;
        config.runner.stages_root = stages_dir;
        config.runner.default_timeout_s = 30;
        config.runner.graceful_shutdown_s = 1;

        let job = Self::make_job(&root_path, workflow, source, targets, 1);

        Self {
            root,
            root_path,
            config: Arc::new(config),
            job,
        }
    }

    fn make_job(root: &Path, workflow: Workflow, source: &str, targets: &[&str], seq: u16) -> Job {
        let job_id = JobId::new(
            chrono::NaiveDate::from_ymd_opt(2025, 6, 14).expect("date"),
            "tester",
            seq,
        )
        .expect("job id");
        let job_dir = root.join("jobs").join(job_id.as_str());
        std::fs::create_dir_all(&job_dir).expect("job dir");
        Job::new(
            job_id,
            workflow,
            root.join("media.mkv"),
            LanguageCode::new(source).expect("source language"),
            targets.iter().map(|t| LanguageCode::new(t).expect("target")).collect(),
            job_dir,
            None,
            None,
            None,
            false,
        )
        .expect("job")
    }

    /// A second job over the same media and configuration (cache-reuse
    /// scenarios).
    pub fn new_job(&self, seq: u16) -> Job {
        Self::make_job(
            &self.root_path,
            self.job.workflow(),
            self.job.source_language().as_str(),
            &self
                .job
                .target_languages()
                .iter()
                .map(|l| l.as_str())
                .collect::<Vec<_>>(),
            seq,
        )
    }

    /// Replaces one stage's program with a custom script body.
    pub fn override_script(&self, stage: &str, body: &str) {
        let path = self.config.runner.stages_root.join(format!("{}.sh", stage));
        std::fs::write(path, body).expect("override script");
    }

    /// Restores one stage's default working script.
    pub fn restore_script(&self, stage: &str) {
        let targets: Vec<&str> = self.job.target_languages().iter().map(|l| l.as_str()).collect();
        let script = default_script(stage, &self.root_path.join("invocations.log"), &targets);
        let path = self.config.runner.stages_root.join(format!("{}.sh", stage));
        std::fs::write(path, script).expect("restore script");
    }

    /// Orchestrator over this fixture's job with a fresh token.
    pub fn orchestrator(&self) -> Orchestrator {
        self.orchestrator_for(self.job.clone(), ShutdownCoordinator::new().token())
    }

    pub fn orchestrator_for(&self, job: Job, cancel: CancellationToken) -> Orchestrator {
        self.orchestrator_custom(job, self.config.clone(), cancel)
    }

    /// Orchestrator with a modified configuration (cache re-key tests).
    pub fn orchestrator_custom(&self, job: Job, config: Arc<JobConfig>, cancel: CancellationToken) -> Orchestrator {
        let registry = EnvironmentRegistry::load(
            &config.runner.environments_file,
            config.runner.stages_root.clone(),
        )
        .expect("environment registry");
        Orchestrator::new(
            job,
            config.clone(),
            StageRunner::new(registry, config.clone()),
            CacheCoordinator::new(config),
            cancel,
        )
    }

    /// Runs the fixture job to a terminal summary.
    pub async fn run(&self) -> RunSummary {
        self.orchestrator().run().await.expect("orchestrator run")
    }

    /// Loads a job's manifest.
    pub fn manifest_of(&self, job: &Job) -> JobManifest {
        ManifestStore::new(job.manifest_path()).load().expect("manifest")
    }

    pub fn manifest(&self) -> JobManifest {
        self.manifest_of(&self.job)
    }

    /// How many times a unit (stage name, or `name.lang`) was invoked as a
    /// subprocess across every run in this fixture.
    pub fn invocations(&self, unit: &str) -> usize {
        let log = self.root_path.join("invocations.log");
        if !log.exists() {
            return 0;
        }
        std::fs::read_to_string(log)
            .expect("invocations log")
            .lines()
            .filter(|line| line.trim() == unit)
            .count()
    }

    /// Total subprocess invocations across all stages.
    pub fn total_invocations(&self) -> usize {
        let log = self.root_path.join("invocations.log");
        if !log.exists() {
            return 0;
        }
        std::fs::read_to_string(log)
            .expect("invocations log")
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count()
    }

    /// Asserts that every file under the job directory lives where the
    /// stage-isolation contract says it may: job-level bookkeeping at the
    /// root, and per-stage files prefixed with their stage's name.
    pub fn assert_artifacts_confined(&self, job: &Job) {
        let job_dir = job.job_dir();
        for entry in std::fs::read_dir(job_dir).expect("job dir") {
            let entry = entry.expect("entry");
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().expect("type").is_file() {
                assert!(
                    ["manifest.json", "pipeline.log", "job.toml", ".lock"].contains(&name.as_str())
                        || name.starts_with("mux_"),
                    "unexpected file in job root: {}",
                    name
                );
                continue;
            }
            // stage directory: NN_name
            let stage_name = name
                .splitn(2, '_')
                .nth(1)
                .unwrap_or_else(|| panic!("unexpected directory in job root: {}", name));
            for file in std::fs::read_dir(entry.path()).expect("stage dir") {
                let file_name = file.expect("file").file_name().to_string_lossy().into_owned();
                assert!(
                    file_name.starts_with(&format!("{}_", stage_name)) || file_name == "stage.log",
                    "stage '{}' directory contains foreign file '{}'",
                    stage_name,
                    file_name
                );
            }
        }
    }
}

/// Default working script for one stage: logs its invocation unit and
/// writes every declared output.
///
/// argv per the subprocess contract: `sh <script> --job-dir <dir>
/// --stage-dir <dir> --config <json>`, so `$4` is the stage dir and `$6`
/// the config snapshot. Fan-out stages read their target language from
/// the snapshot; non-fan-out stages with per-language outputs (subtitle
/// rendering) get the job's target list baked in at generation time.
pub fn default_script(stage: &str, invocations_log: &Path, targets: &[&str]) -> String {
    let descriptor = StageRegistry::by_name(stage).expect("known stage");
    let mut script = String::from("#!/bin/sh\n");
    script.push_str("lang=$(sed -n 's/.*\"target_language\": \"\\([a-z]*\\)\".*/\\1/p' \"$6\")\n");
    script.push_str(&format!("unit=\"{}\"\n", stage));
    script.push_str(&format!("[ -n \"$lang\" ] && unit=\"{}.$lang\"\n", stage));
    script.push_str(&format!("echo \"$unit\" >> \"{}\"\n", invocations_log.display()));
    for output in descriptor.outputs {
        let names: Vec<String> = if !output.pattern.contains("{lang}") {
            vec![output.pattern.to_string()]
        } else if descriptor.per_target_language {
            vec![output.pattern.replace("{lang}", "${lang}")]
        } else {
            targets.iter().map(|t| output.pattern.replace("{lang}", t)).collect()
        };
        for name in names {
            if output.pattern.ends_with(".json") {
                script.push_str(&format!(
                    "printf '{{\"stage\":\"{}\",\"items\":[]}}' > \"$4/{}\"\n",
                    stage, name
                ));
            } else {
                script.push_str(&format!("printf 'output from {}\\n' > \"$4/{}\"\n", stage, name));
            }
        }
    }
    script.push_str("exit 0\n");
    script
}

fn environments_toml(stages_dir: &Path) -> String {
    let mut toml = String::from("[environments]\n");
    for label in [
        "media_env",
        "net_env",
        "text_env",
        "separation_env",
        "asr_env",
        "align_env",
        "translate_env",
    ] {
        toml.push_str(&format!("{} = \"/bin/sh\"\n", label));
    }
    toml.push_str("\n[scripts]\n");
    for descriptor in StageRegistry::all() {
        toml.push_str(&format!(
            "{} = \"{}\"\n",
            descriptor.name,
            stages_dir.join(format!("{}.sh", descriptor.name)).display()
        ));
    }
    toml
}
