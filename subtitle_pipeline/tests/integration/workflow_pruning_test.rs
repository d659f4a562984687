// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Workflow pruning through the whole orchestrator: each workflow runs
//! exactly its mandatory stages, gate skips are recorded, and final
//! artifacts land in the producing stage's directory.

use crate::common::PipelineFixture;
use subtitle_pipeline_domain::{JobStatus, StageStatus, Workflow};

#[tokio::test]
async fn transcribe_runs_only_recognition_stages() {
    let fixture = PipelineFixture::new(Workflow::Transcribe, "en", &[]);
    let summary = fixture.run().await;

    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(summary.cache_hits, 0, "first run is all misses");
    assert_eq!(summary.units_executed, 4);

    let manifest = fixture.manifest();
    for stage in ["demux", "vad", "asr", "alignment"] {
        assert_eq!(manifest.stage(stage).unwrap().status(), StageStatus::Success, "{}", stage);
    }
    // English is outside the Indic set: separation is gate-skipped with a reason
    let separation = manifest.stage("source_separation").unwrap();
    assert_eq!(separation.status(), StageStatus::Skipped);
    assert!(separation.error_summary().unwrap().contains("Indic"));

    // translation and subtitling stages are never even planned
    for stage in ["tmdb_enrich", "glossary_load", "lyrics_detection", "subtitle_generation", "mux"] {
        assert!(manifest.stage(stage).is_none(), "{} must not appear", stage);
    }
    assert!(!manifest.stages().keys().any(|k| k.starts_with("translation")));

    // the plain transcript is the job's final artifact, under stage 07
    let transcript = fixture.job.job_dir().join("07_alignment").join("alignment_transcript.txt");
    assert!(transcript.exists());
}

#[tokio::test]
async fn translate_runs_glossary_separation_and_single_target() {
    let fixture = PipelineFixture::new(Workflow::Translate, "hi", &["en"]);
    let summary = fixture.run().await;
    assert_eq!(summary.status, JobStatus::Completed);

    let manifest = fixture.manifest();
    // Hindi is Indic: the separation gate schedules stage 04
    for stage in ["demux", "glossary_load", "source_separation", "vad", "asr", "alignment"] {
        assert_eq!(manifest.stage(stage).unwrap().status(), StageStatus::Success, "{}", stage);
    }
    let translation = manifest.stage("translation.en").unwrap();
    assert_eq!(translation.status(), StageStatus::Success);
    assert!(translation.fingerprint().is_some(), "cacheable fan-out unit carries its fingerprint");

    for stage in ["subtitle_generation", "mux", "tmdb_enrich"] {
        assert!(manifest.stage(stage).is_none(), "{} must not appear", stage);
    }

    let translated = fixture.job.job_dir().join("10_translation").join("translation_text_en.txt");
    assert!(translated.exists());
    assert_eq!(fixture.invocations("translation.en"), 1);
}

#[tokio::test]
async fn subtitle_runs_all_twelve_stages_with_fan_out() {
    let fixture = PipelineFixture::new(Workflow::Subtitle, "hi", &["en", "gu", "es"]);
    let summary = fixture.run().await;
    assert_eq!(summary.status, JobStatus::Completed);

    let manifest = fixture.manifest();
    for stage in [
        "demux",
        "tmdb_enrich",
        "glossary_load",
        "source_separation",
        "vad",
        "asr",
        "alignment",
        "lyrics_detection",
        "hallucination_removal",
        "subtitle_generation",
        "mux",
    ] {
        assert_eq!(manifest.stage(stage).unwrap().status(), StageStatus::Success, "{}", stage);
    }

    // one invocation per target language, three distinct fingerprints
    let fingerprints: Vec<String> = ["en", "gu", "es"]
        .iter()
        .map(|lang| {
            let unit = manifest.stage(&format!("translation.{}", lang)).unwrap();
            assert_eq!(unit.status(), StageStatus::Success);
            unit.fingerprint().unwrap().to_string()
        })
        .collect();
    assert_ne!(fingerprints[0], fingerprints[1]);
    assert_ne!(fingerprints[1], fingerprints[2]);
    assert_ne!(fingerprints[0], fingerprints[2]);
    for lang in ["en", "gu", "es"] {
        assert_eq!(fixture.invocations(&format!("translation.{}", lang)), 1);
    }

    // the muxed container exists in its stage directory and is promoted
    // into the job root (the one sanctioned exception to confinement)
    let stage_copy = fixture.job.job_dir().join("12_mux").join("mux_output.mkv");
    let promoted = fixture.job.job_dir().join("mux_output.mkv");
    assert!(stage_copy.exists());
    assert!(promoted.exists(), "final container must land in the job root");
    assert_eq!(
        std::fs::read(&stage_copy).unwrap(),
        std::fs::read(&promoted).unwrap(),
        "promotion must be a byte-identical copy"
    );
    // every other artifact stayed in its lane
    fixture.assert_artifacts_confined(&fixture.job);
}

#[tokio::test]
async fn per_language_artifacts_are_written_per_target() {
    let fixture = PipelineFixture::new(Workflow::Subtitle, "hi", &["en", "gu"]);
    fixture.run().await;
    let translation_dir = fixture.job.job_dir().join("10_translation");
    for lang in ["en", "gu"] {
        assert!(translation_dir.join(format!("translation_segments_{}.json", lang)).exists());
        assert!(translation_dir.join(format!("translation_text_{}.txt", lang)).exists());
    }
}
