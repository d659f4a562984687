// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Registry
//!
//! Declarative catalog of the twelve processing stages. The registry is
//! static data, not behavior: every planner decision, cache key derivation,
//! and output-filtering rule reads from these descriptors, which makes
//! those decisions inspectable in one place and trivially testable.
//!
//! The previous generation of this system loaded per-stage modules
//! dynamically and let each one consult shared mutable configuration;
//! the static registry replaces that with fixed ordinals and declared
//! inputs, outputs, and cache contributions.
//!
//! ## The Twelve Stages
//!
//! | Ord | Name | Mandatory in | Cacheable |
//! |-----|------|--------------|-----------|
//! | 01 | demux | all | yes |
//! | 02 | tmdb_enrich | subtitle | no (soft-failable) |
//! | 03 | glossary_load | subtitle, translate | no |
//! | 04 | source_separation | all (gated) | yes |
//! | 05 | vad | all | yes |
//! | 06 | asr | all | yes |
//! | 07 | alignment | all | yes (isolated subprocess) |
//! | 08 | lyrics_detection | subtitle | yes |
//! | 09 | hallucination_removal | subtitle | no |
//! | 10 | translation | translate, subtitle | yes (per target language) |
//! | 11 | subtitle_generation | subtitle | no |
//! | 12 | mux | subtitle | no (may emit into the job root) |
//!
//! ## Cache Contract
//!
//! Any configuration key that materially changes a cacheable stage's output
//! MUST be listed in that stage's `fingerprint_extras` (or be its
//! `model_key`). Adding a behavior-changing key without updating the
//! descriptor makes the cache serve wrong results; the registry unit tests
//! pin the expected contributions so the two can only change together.

use crate::value_objects::Workflow;

/// One declared output artifact of a stage.
///
/// `pattern` is a concrete file name, optionally carrying a `{lang}`
/// placeholder for per-language fan-out artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSpec {
    pub logical_name: &'static str,
    pub pattern: &'static str,
}

/// Gating predicate applied by the planner after workflow pruning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageGate {
    /// Run when the source language is in the configured Indic set, or the
    /// explicit `source_separation.enabled` flag is set
    SourceSeparationHeuristic,
}

/// Static description of one pipeline stage.
#[derive(Debug, Clone, Copy)]
pub struct StageDescriptor {
    /// Fixed position 1-12; also the stage directory prefix
    pub ordinal: u8,
    pub name: &'static str,
    /// Logical execution environment label, resolved to an interpreter
    pub environment: &'static str,
    /// Logical artifact names read from prior stage directories
    pub inputs: &'static [&'static str],
    /// Artifacts this stage must produce
    pub outputs: &'static [OutputSpec],
    /// Workflows in which this stage executes at all
    pub mandatory_for: &'static [Workflow],
    pub cacheable: bool,
    /// Config keys whose values participate in the stage fingerprint
    pub fingerprint_extras: &'static [&'static str],
    /// Config key naming the model identifier, when the stage has one
    pub model_key: Option<&'static str>,
    /// Run out-of-process fault containment: a crash after complete output
    /// production is reclassified as success
    pub isolate: bool,
    /// Failure yields an empty artifact and the run continues
    pub soft_failable: bool,
    /// Execute once per target language, each with its own fingerprint
    pub per_target_language: bool,
    /// Gating predicate, when the stage is conditional
    pub gate: Option<StageGate>,
    /// The orchestrator promotes this stage's outputs into the job root
    /// after success (the final mux container only)
    pub may_write_job_root: bool,
}

impl StageDescriptor {
    /// Stage directory name under the job dir, e.g. `06_asr`.
    pub fn dir_name(&self) -> String {
        format!("{:02}_{}", self.ordinal, self.name)
    }

    /// Whether the stage belongs to a workflow's plan at all.
    pub fn is_mandatory_for(&self, workflow: Workflow) -> bool {
        self.mandatory_for.contains(&workflow)
    }

    /// Whether a failure aborts the run (everything but soft-failable).
    pub fn required(&self) -> bool {
        !self.soft_failable
    }
}

const ALL_WORKFLOWS: &[Workflow] = &[Workflow::Transcribe, Workflow::Translate, Workflow::Subtitle];
const SUBTITLE_ONLY: &[Workflow] = &[Workflow::Subtitle];
const TRANSLATING: &[Workflow] = &[Workflow::Translate, Workflow::Subtitle];

static STAGES: [StageDescriptor; 12] = [
    StageDescriptor {
        ordinal: 1,
        name: "demux",
        environment: "media_env",
        inputs: &[],
        outputs: &[OutputSpec {
            logical_name: "audio",
            pattern: "demux_audio.wav",
        }],
        mandatory_for: ALL_WORKFLOWS,
        cacheable: true,
        fingerprint_extras: &["audio.sample_rate", "audio.channels", "clip.start", "clip.end"],
        model_key: None,
        isolate: false,
        soft_failable: false,
        per_target_language: false,
        gate: None,
        may_write_job_root: false,
    },
    StageDescriptor {
        ordinal: 2,
        name: "tmdb_enrich",
        environment: "net_env",
        inputs: &[],
        outputs: &[OutputSpec {
            logical_name: "metadata_bundle",
            pattern: "tmdb_enrich_metadata.json",
        }],
        mandatory_for: SUBTITLE_ONLY,
        cacheable: false,
        fingerprint_extras: &[],
        model_key: None,
        isolate: false,
        soft_failable: true,
        per_target_language: false,
        gate: None,
        may_write_job_root: false,
    },
    StageDescriptor {
        ordinal: 3,
        name: "glossary_load",
        environment: "text_env",
        inputs: &[],
        outputs: &[OutputSpec {
            logical_name: "glossary_bundle",
            pattern: "glossary_load_bundle.json",
        }],
        mandatory_for: TRANSLATING,
        cacheable: false,
        fingerprint_extras: &[],
        model_key: None,
        isolate: false,
        soft_failable: false,
        per_target_language: false,
        gate: None,
        may_write_job_root: false,
    },
    StageDescriptor {
        ordinal: 4,
        name: "source_separation",
        environment: "separation_env",
        inputs: &["audio"],
        outputs: &[OutputSpec {
            logical_name: "vocals",
            pattern: "source_separation_vocals.wav",
        }],
        mandatory_for: ALL_WORKFLOWS,
        cacheable: true,
        fingerprint_extras: &[],
        model_key: Some("source_separation.model"),
        isolate: false,
        soft_failable: false,
        per_target_language: false,
        gate: Some(StageGate::SourceSeparationHeuristic),
        may_write_job_root: false,
    },
    StageDescriptor {
        ordinal: 5,
        name: "vad",
        environment: "asr_env",
        inputs: &["audio"],
        outputs: &[OutputSpec {
            logical_name: "speech_segments",
            pattern: "vad_segments.json",
        }],
        mandatory_for: ALL_WORKFLOWS,
        cacheable: true,
        fingerprint_extras: &[],
        model_key: None,
        isolate: false,
        soft_failable: false,
        per_target_language: false,
        gate: None,
        may_write_job_root: false,
    },
    StageDescriptor {
        ordinal: 6,
        name: "asr",
        environment: "asr_env",
        inputs: &["audio", "speech_segments"],
        outputs: &[OutputSpec {
            logical_name: "segments",
            pattern: "asr_segments.json",
        }],
        mandatory_for: ALL_WORKFLOWS,
        cacheable: true,
        fingerprint_extras: &["asr.language_hint", "asr.beam_size"],
        model_key: Some("asr.model_id"),
        isolate: false,
        soft_failable: false,
        per_target_language: false,
        gate: None,
        may_write_job_root: false,
    },
    StageDescriptor {
        ordinal: 7,
        name: "alignment",
        environment: "align_env",
        inputs: &["audio", "segments"],
        outputs: &[
            OutputSpec {
                logical_name: "aligned_segments",
                pattern: "alignment_segments.json",
            },
            OutputSpec {
                logical_name: "transcript",
                pattern: "alignment_transcript.txt",
            },
        ],
        mandatory_for: ALL_WORKFLOWS,
        cacheable: true,
        fingerprint_extras: &[],
        model_key: Some("align.model_id"),
        // The aligner backend is known to corrupt process memory after
        // producing correct output on some accelerators.
        isolate: true,
        soft_failable: false,
        per_target_language: false,
        gate: None,
        may_write_job_root: false,
    },
    StageDescriptor {
        ordinal: 8,
        name: "lyrics_detection",
        environment: "asr_env",
        inputs: &["aligned_segments", "audio"],
        outputs: &[OutputSpec {
            logical_name: "lyric_regions",
            pattern: "lyrics_detection_regions.json",
        }],
        mandatory_for: SUBTITLE_ONLY,
        cacheable: true,
        fingerprint_extras: &[],
        model_key: None,
        isolate: false,
        soft_failable: false,
        per_target_language: false,
        gate: None,
        may_write_job_root: false,
    },
    StageDescriptor {
        ordinal: 9,
        name: "hallucination_removal",
        environment: "text_env",
        inputs: &["aligned_segments", "lyric_regions"],
        outputs: &[OutputSpec {
            logical_name: "clean_segments",
            pattern: "hallucination_removal_segments.json",
        }],
        mandatory_for: SUBTITLE_ONLY,
        cacheable: false,
        fingerprint_extras: &[],
        model_key: None,
        isolate: false,
        soft_failable: false,
        per_target_language: false,
        gate: None,
        may_write_job_root: false,
    },
    StageDescriptor {
        ordinal: 10,
        name: "translation",
        environment: "translate_env",
        inputs: &["aligned_segments", "clean_segments", "glossary_bundle"],
        outputs: &[
            OutputSpec {
                logical_name: "translated_segments",
                pattern: "translation_segments_{lang}.json",
            },
            OutputSpec {
                logical_name: "translated_text",
                pattern: "translation_text_{lang}.txt",
            },
        ],
        mandatory_for: TRANSLATING,
        cacheable: true,
        fingerprint_extras: &["translation.engine"],
        model_key: Some("translation.model_id"),
        isolate: false,
        soft_failable: false,
        per_target_language: true,
        gate: None,
        may_write_job_root: false,
    },
    StageDescriptor {
        ordinal: 11,
        name: "subtitle_generation",
        environment: "text_env",
        inputs: &["translated_segments", "metadata_bundle", "lyric_regions"],
        outputs: &[OutputSpec {
            logical_name: "subtitle_tracks",
            pattern: "subtitle_generation_{lang}.srt",
        }],
        mandatory_for: SUBTITLE_ONLY,
        cacheable: false,
        fingerprint_extras: &[],
        model_key: None,
        isolate: false,
        soft_failable: false,
        per_target_language: false,
        gate: None,
        may_write_job_root: false,
    },
    StageDescriptor {
        ordinal: 12,
        name: "mux",
        environment: "media_env",
        inputs: &["subtitle_tracks"],
        outputs: &[OutputSpec {
            logical_name: "final_video",
            pattern: "mux_output.mkv",
        }],
        mandatory_for: SUBTITLE_ONLY,
        cacheable: false,
        fingerprint_extras: &[],
        model_key: None,
        isolate: false,
        soft_failable: false,
        per_target_language: false,
        gate: None,
        may_write_job_root: true,
    },
];

/// Read access to the static stage catalog.
pub struct StageRegistry;

impl StageRegistry {
    /// All twelve stages in ordinal order.
    pub fn all() -> &'static [StageDescriptor] {
        &STAGES
    }

    /// Looks up a stage by name.
    pub fn by_name(name: &str) -> Option<&'static StageDescriptor> {
        STAGES.iter().find(|s| s.name == name)
    }

    /// Looks up a stage by ordinal (1-12).
    pub fn by_ordinal(ordinal: u8) -> Option<&'static StageDescriptor> {
        STAGES.iter().find(|s| s.ordinal == ordinal)
    }

    /// Finds the stage that produces a logical artifact.
    pub fn producer_of(logical_name: &str) -> Option<(&'static StageDescriptor, &'static OutputSpec)> {
        STAGES.iter().find_map(|stage| {
            stage
                .outputs
                .iter()
                .find(|o| o.logical_name == logical_name)
                .map(|o| (stage, o))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twelve_stages_with_strictly_increasing_ordinals() {
        let stages = StageRegistry::all();
        assert_eq!(stages.len(), 12);
        for window in stages.windows(2) {
            assert!(window[0].ordinal < window[1].ordinal);
        }
        assert_eq!(stages[0].name, "demux");
        assert_eq!(stages[11].name, "mux");
    }

    #[test]
    fn test_dir_names_carry_zero_padded_ordinals() {
        assert_eq!(StageRegistry::by_name("demux").unwrap().dir_name(), "01_demux");
        assert_eq!(StageRegistry::by_name("mux").unwrap().dir_name(), "12_mux");
    }

    #[test]
    fn test_mandatory_sets_match_spec_table() {
        let for_workflow = |wf: Workflow| -> Vec<u8> {
            StageRegistry::all()
                .iter()
                .filter(|s| s.is_mandatory_for(wf))
                .map(|s| s.ordinal)
                .collect()
        };
        assert_eq!(for_workflow(Workflow::Transcribe), vec![1, 4, 5, 6, 7]);
        assert_eq!(for_workflow(Workflow::Translate), vec![1, 3, 4, 5, 6, 7, 10]);
        assert_eq!(
            for_workflow(Workflow::Subtitle),
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
        );
    }

    #[test]
    fn test_only_tmdb_is_soft_failable() {
        let soft: Vec<&str> = StageRegistry::all()
            .iter()
            .filter(|s| s.soft_failable)
            .map(|s| s.name)
            .collect();
        assert_eq!(soft, vec!["tmdb_enrich"]);
    }

    #[test]
    fn test_only_alignment_is_isolated() {
        let isolated: Vec<&str> = StageRegistry::all()
            .iter()
            .filter(|s| s.isolate)
            .map(|s| s.name)
            .collect();
        assert_eq!(isolated, vec!["alignment"]);
    }

    #[test]
    fn test_only_translation_fans_out() {
        let fan_out: Vec<&str> = StageRegistry::all()
            .iter()
            .filter(|s| s.per_target_language)
            .map(|s| s.name)
            .collect();
        assert_eq!(fan_out, vec!["translation"]);
    }

    #[test]
    fn test_only_mux_may_write_job_root() {
        let root_writers: Vec<&str> = StageRegistry::all()
            .iter()
            .filter(|s| s.may_write_job_root)
            .map(|s| s.name)
            .collect();
        assert_eq!(root_writers, vec!["mux"]);
    }

    // Alignment is mandatory in every workflow; only the separation
    // heuristic may prune a stage after workflow filtering.
    #[test]
    fn test_only_source_separation_is_gated() {
        let gated: Vec<&str> = StageRegistry::all()
            .iter()
            .filter(|s| s.gate.is_some())
            .map(|s| s.name)
            .collect();
        assert_eq!(gated, vec!["source_separation"]);
        assert!(StageRegistry::by_name("alignment").unwrap().gate.is_none());
    }

    #[test]
    fn test_producer_map_resolves_declared_inputs() {
        for stage in StageRegistry::all() {
            for input in stage.inputs {
                let (producer, _) = StageRegistry::producer_of(input)
                    .unwrap_or_else(|| panic!("no producer for input '{}' of {}", input, stage.name));
                assert!(
                    producer.ordinal < stage.ordinal,
                    "{} consumes '{}' from downstream stage {}",
                    stage.name,
                    input,
                    producer.name
                );
            }
        }
    }

    #[test]
    fn test_output_patterns_satisfy_filename_rule() {
        use crate::value_objects::ArtifactFileName;
        for stage in StageRegistry::all() {
            for output in stage.outputs {
                let name = ArtifactFileName::expand_pattern(output.pattern, Some("en"));
                assert!(
                    ArtifactFileName::for_stage(stage.name, &name).is_ok(),
                    "pattern '{}' of {} violates the filename rule",
                    output.pattern,
                    stage.name
                );
            }
        }
    }

    // Cache-relevant config keys and the stage that must declare them.
    // Adding a behavior-changing key to the config without extending the
    // owning descriptor breaks cache identity; this test makes that a
    // compile-visible failure instead of a silent wrong-result.
    #[test]
    fn test_fingerprint_extras_audit() {
        let declared = |stage: &str, key: &str| -> bool {
            let s = StageRegistry::by_name(stage).unwrap();
            s.fingerprint_extras.contains(&key) || s.model_key == Some(key)
        };
        assert!(declared("demux", "audio.sample_rate"));
        assert!(declared("demux", "audio.channels"));
        assert!(declared("demux", "clip.start"));
        assert!(declared("demux", "clip.end"));
        assert!(declared("asr", "asr.model_id"));
        assert!(declared("asr", "asr.language_hint"));
        assert!(declared("asr", "asr.beam_size"));
        assert!(declared("alignment", "align.model_id"));
        assert!(declared("source_separation", "source_separation.model"));
        assert!(declared("translation", "translation.model_id"));
        assert!(declared("translation", "translation.engine"));
    }

    #[test]
    fn test_non_cacheable_stages_declare_no_extras() {
        for stage in StageRegistry::all().iter().filter(|s| !s.cacheable) {
            assert!(
                stage.fingerprint_extras.is_empty() && stage.model_key.is_none(),
                "{} is not cacheable but declares fingerprint material",
                stage.name
            );
        }
    }
}
