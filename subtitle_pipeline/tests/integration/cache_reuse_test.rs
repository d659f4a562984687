// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Cache behavior across whole runs: a second job over identical media
//! and parameters restores instead of recomputing, completed jobs resume
//! as no-ops, and changing a fingerprint-relevant key re-executes.

use crate::common::{sha256_hex, PipelineFixture};
use std::sync::Arc;
use subtitle_pipeline_bootstrap::ShutdownCoordinator;
use subtitle_pipeline_domain::{CacheSource, JobStatus, StageStatus, Workflow};

const CACHEABLE_TRANSCRIBE_STAGES: [&str; 4] = ["demux", "vad", "asr", "alignment"];

#[tokio::test]
async fn second_job_with_identical_inputs_restores_every_cacheable_stage() {
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    let first = fixture.run().await;
    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(first.cache_hits, 0);

    let second_job = fixture.new_job(2);
    let orchestrator = fixture.orchestrator_for(second_job.clone(), ShutdownCoordinator::new().token());
    let second = orchestrator.run().await.unwrap();

    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(second.cache_hits, 4, "every cacheable stage hits");
    assert_eq!(second.units_executed, 0, "no subprocess ran for cacheable stages");
    assert!(second.bytes_restored > 0);

    let manifest = fixture.manifest_of(&second_job);
    for stage in CACHEABLE_TRANSCRIBE_STAGES {
        let entry = manifest.stage(stage).unwrap();
        assert_eq!(entry.status(), StageStatus::CacheHit, "{}", stage);
        assert_eq!(entry.cache_source(), Some(CacheSource::Hit), "{}", stage);
    }

    // each stage subprocess ran exactly once across both jobs
    for stage in CACHEABLE_TRANSCRIBE_STAGES {
        assert_eq!(fixture.invocations(stage), 1, "{}", stage);
    }
}

#[tokio::test]
async fn restored_outputs_are_byte_identical() {
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    fixture.run().await;

    let second_job = fixture.new_job(2);
    fixture
        .orchestrator_for(second_job.clone(), ShutdownCoordinator::new().token())
        .run()
        .await
        .unwrap();

    for relative in [
        "01_demux/demux_audio.wav",
        "06_asr/asr_segments.json",
        "07_alignment/alignment_transcript.txt",
    ] {
        let original = std::fs::read(fixture.job.job_dir().join(relative)).unwrap();
        let restored = std::fs::read(second_job.job_dir().join(relative)).unwrap();
        assert_eq!(
            sha256_hex(&original),
            sha256_hex(&restored),
            "{} must restore byte-identical",
            relative
        );
    }
}

#[tokio::test]
async fn rerunning_a_completed_job_is_a_noop() {
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    fixture.run().await;
    let invocations_before = fixture.total_invocations();
    let manifest_before = fixture.manifest();

    let again = fixture.run().await;

    assert_eq!(again.status, JobStatus::Completed);
    assert_eq!(fixture.total_invocations(), invocations_before, "zero new subprocesses");
    let manifest_after = fixture.manifest();
    assert!(manifest_after.updated_at() > manifest_before.updated_at(), "updated_at bumps");
    // stage records are untouched
    assert_eq!(
        serde_json::to_value(manifest_before.stages()).unwrap(),
        serde_json::to_value(manifest_after.stages()).unwrap()
    );
}

#[tokio::test]
async fn changing_a_fingerprint_extra_re_executes_the_stage() {
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    fixture.run().await;
    assert_eq!(fixture.invocations("asr"), 1);

    // same media, new job, one cache-relevant ASR parameter changed
    let mut config = (*fixture.config).clone();
    config.asr.beam_size = 9;
    let third_job = fixture.new_job(3);
    let summary = fixture
        .orchestrator_custom(third_job.clone(), Arc::new(config), ShutdownCoordinator::new().token())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(fixture.invocations("asr"), 2, "asr re-keyed and re-ran");
    // stages whose parameters did not change still hit
    assert_eq!(fixture.invocations("vad"), 1);
    assert_eq!(fixture.invocations("demux"), 1);

    let manifest = fixture.manifest_of(&third_job);
    assert_eq!(manifest.stage("asr").unwrap().status(), StageStatus::Success);
    assert_eq!(manifest.stage("vad").unwrap().status(), StageStatus::CacheHit);
}

#[tokio::test]
async fn disabled_cache_always_executes() {
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    let mut config = (*fixture.config).clone();
    config.cache.enabled = false;
    let config = Arc::new(config);

    fixture
        .orchestrator_custom(fixture.job.clone(), config.clone(), ShutdownCoordinator::new().token())
        .run()
        .await
        .unwrap();
    let second_job = fixture.new_job(2);
    let summary = fixture
        .orchestrator_custom(second_job, config, ShutdownCoordinator::new().token())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.cache_hits, 0);
    assert_eq!(fixture.invocations("asr"), 2);
}
