// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Interruption and recovery: cancellation mid-stage, resume from the
//! exact failed stage, and manifest monotonicity across runs.

use crate::common::PipelineFixture;
use subtitle_pipeline_bootstrap::{ShutdownCoordinator, ShutdownSignal};
use subtitle_pipeline_domain::{JobStatus, StageStatus, Workflow};

#[tokio::test]
async fn cancellation_mid_stage_is_recorded_and_resumable() {
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    // asr signals that it started, then hangs until killed
    let marker = fixture.root_path.join("asr_started");
    fixture.override_script(
        "asr",
        &format!("#!/bin/sh\ntouch \"{}\"\nexec sleep 30\n", marker.display()),
    );

    let coordinator = ShutdownCoordinator::new();
    let token = coordinator.token();
    let orchestrator = fixture.orchestrator_for(fixture.job.clone(), token);
    let run = tokio::spawn(async move { orchestrator.run().await });

    // wait until the stage is provably in flight, then pull the plug
    while !marker.exists() {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    coordinator.request_shutdown(ShutdownSignal::Interrupt);

    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.status, JobStatus::Partial);
    assert!(summary.cancelled);

    let manifest = fixture.manifest();
    assert_eq!(manifest.status(), JobStatus::Partial);
    let asr = manifest.stage("asr").unwrap();
    assert_eq!(asr.status(), StageStatus::Failed);
    assert!(asr.error_summary().unwrap().contains("cancelled"));
    // earlier stages completed and stay completed
    assert_eq!(manifest.stage("demux").unwrap().status(), StageStatus::Success);
    assert_eq!(manifest.stage("vad").unwrap().status(), StageStatus::Success);

    // resume: restore a working asr and run the same job again
    fixture.restore_script("asr");
    let resumed = fixture.run().await;
    assert_eq!(resumed.status, JobStatus::Completed);

    let manifest = fixture.manifest();
    assert_eq!(manifest.status(), JobStatus::Completed);
    assert_eq!(manifest.stage("asr").unwrap().status(), StageStatus::Success);

    // demux and vad were not re-invoked; asr restarted exactly once
    assert_eq!(fixture.invocations("demux"), 1);
    assert_eq!(fixture.invocations("vad"), 1);
    assert_eq!(fixture.invocations("asr"), 1, "the hung attempt never logged a completion");
}

#[tokio::test]
async fn resume_restarts_exactly_the_failed_stage() {
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    fixture.override_script("asr", "#!/bin/sh\necho 'oom' >&2\nexit 137\n");

    let first = fixture.run().await;
    assert_eq!(first.status, JobStatus::Partial);
    assert_eq!(fixture.manifest().stage("asr").unwrap().status(), StageStatus::Failed);

    fixture.restore_script("asr");
    let second = fixture.run().await;
    assert_eq!(second.status, JobStatus::Completed);

    // only asr and the stages after it executed on resume
    assert_eq!(fixture.invocations("demux"), 1);
    assert_eq!(fixture.invocations("vad"), 1);
    assert_eq!(fixture.invocations("asr"), 1, "failed attempt wrote no invocation line");
    assert_eq!(fixture.invocations("alignment"), 1);
}

#[tokio::test]
async fn resumed_run_skips_cache_hits_too() {
    // interrupt after alignment cached its outputs, then resume with a
    // cleared stage dir: the cache restores instead of re-running
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    let summary = fixture.run().await;
    assert_eq!(summary.status, JobStatus::Completed);

    // a fresh job over the same media resumes from the cache alone
    let second = fixture.new_job(2);
    let resumed = fixture
        .orchestrator_for(second.clone(), ShutdownCoordinator::new().token())
        .run()
        .await
        .unwrap();
    assert_eq!(resumed.status, JobStatus::Completed);
    assert_eq!(resumed.units_executed, 0);
    assert_eq!(fixture.manifest_of(&second).stage("alignment").unwrap().status(), StageStatus::CacheHit);
}

#[tokio::test]
async fn manifest_transitions_stay_monotonic_across_interrupt_and_resume() {
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    fixture.override_script("vad", "#!/bin/sh\nexit 1\n");

    fixture.run().await;
    let failed_at = fixture.manifest().updated_at().to_owned();

    fixture.restore_script("vad");
    fixture.run().await;

    let manifest = fixture.manifest();
    assert!(manifest.updated_at() > &failed_at);
    // every terminal record is in a legal terminal state
    for (key, inv) in manifest.stages() {
        assert!(
            inv.status().is_terminal(),
            "stage '{}' left non-terminal after completed run",
            key
        );
    }
}
