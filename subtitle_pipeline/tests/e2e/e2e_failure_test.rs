// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Failure-injection scenarios: tolerated post-output crashes, crashes
//! without outputs, missing declared outputs, and the one soft-failable
//! stage.

use crate::common::{default_script, PipelineFixture};
use subtitle_pipeline_domain::{JobStatus, StageStatus, Workflow};

/// Default script body with the final `exit 0` swapped for a segfault, so
/// the stage produces complete outputs and then dies.
fn crash_after_outputs(fixture: &PipelineFixture, stage: &str) -> String {
    let targets: Vec<&str> = fixture.job.target_languages().iter().map(|l| l.as_str()).collect();
    let script = default_script(stage, &fixture.root_path.join("invocations.log"), &targets);
    script.replace("exit 0\n", "kill -11 $$\n")
}

#[tokio::test]
async fn post_output_segfault_in_alignment_is_tolerated() {
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    fixture.override_script("alignment", &crash_after_outputs(&fixture, "alignment"));

    let summary = fixture.run().await;
    assert_eq!(summary.status, JobStatus::Completed, "pipeline continues past the crash");

    let alignment = fixture.manifest().stage("alignment").unwrap().clone();
    assert_eq!(alignment.status(), StageStatus::Success);
    assert!(
        alignment.error_summary().unwrap().contains("tolerated_post_crash"),
        "the crash is logged prominently, not hidden"
    );
}

#[tokio::test]
async fn segfault_without_outputs_fails_the_run() {
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    fixture.override_script("alignment", "#!/bin/sh\nkill -11 $$\n");

    let summary = fixture.run().await;
    assert_eq!(summary.status, JobStatus::Partial);
    let (unit, reason, _log) = summary.failure.unwrap();
    assert_eq!(unit, "alignment");
    assert!(reason.contains("signal 11"));

    let alignment = fixture.manifest().stage("alignment").unwrap().clone();
    assert_eq!(alignment.status(), StageStatus::Failed);
}

#[tokio::test]
async fn post_output_crash_is_not_tolerated_for_other_stages() {
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    fixture.override_script("vad", &crash_after_outputs(&fixture, "vad"));

    let summary = fixture.run().await;
    assert_eq!(summary.status, JobStatus::Partial);
    assert_eq!(fixture.manifest().stage("vad").unwrap().status(), StageStatus::Failed);
}

#[tokio::test]
async fn clean_exit_with_missing_outputs_is_a_failure() {
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    fixture.override_script("vad", "#!/bin/sh\nexit 0\n");

    let summary = fixture.run().await;
    assert_eq!(summary.status, JobStatus::Partial);
    let vad = fixture.manifest().stage("vad").unwrap().clone();
    assert_eq!(vad.status(), StageStatus::Failed);
    assert!(vad.error_summary().unwrap().contains("output_missing"));
    assert!(vad.error_summary().unwrap().contains("vad_segments.json"));
}

#[tokio::test]
async fn metadata_enrichment_failure_is_soft() {
    let fixture = PipelineFixture::new(Workflow::Subtitle, "hi", &["en"]);
    fixture.override_script(
        "tmdb_enrich",
        "#!/bin/sh\necho 'tmdb api unreachable' >&2\nexit 7\n",
    );

    let summary = fixture.run().await;
    assert_eq!(summary.status, JobStatus::Completed, "the run proceeds without metadata");

    let manifest = fixture.manifest();
    let tmdb = manifest.stage("tmdb_enrich").unwrap();
    assert_eq!(tmdb.status(), StageStatus::Failed);
    assert!(tmdb.error_summary().unwrap().contains("tmdb api unreachable"));

    // an empty bundle stands in for the real one
    let bundle = fixture
        .job
        .job_dir()
        .join("02_tmdb_enrich")
        .join("tmdb_enrich_metadata.json");
    assert_eq!(std::fs::read_to_string(bundle).unwrap(), "{}");

    // downstream subtitling still happened
    assert_eq!(manifest.stage("mux").unwrap().status(), StageStatus::Success);
}

#[tokio::test]
async fn failed_stage_reports_its_log_path() {
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    fixture.override_script("asr", "#!/bin/sh\necho 'decoder exploded' >&2\nexit 2\n");

    let summary = fixture.run().await;
    let (unit, reason, log_path) = summary.failure.unwrap();
    assert_eq!(unit, "asr");
    assert!(reason.contains("decoder exploded"));
    let log = std::fs::read_to_string(log_path).unwrap();
    assert!(log.contains("decoder exploded"));
}
