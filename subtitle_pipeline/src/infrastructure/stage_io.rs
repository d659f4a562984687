// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage I/O Contract
//!
//! The per-invocation working-directory contract handed to every stage:
//! an isolated `stage_dir` under the job directory, a config snapshot, a
//! log file, and `upstream()` dereferencing for declared inputs.
//!
//! The rules here are enforced by construction rather than convention:
//!
//! 1. A stage writes only inside its own `stage_dir`.
//!    [`StageWorkspace::open_output`] is the single sanctioned creation
//!    point and rejects absolute paths, traversal, and names violating
//!    the `<stage>_<descriptor>.<ext>` rule. The one exception is the
//!    final mux stage: its descriptor's `may_write_job_root` flag makes
//!    the orchestrator promote the finished container into the job root
//!    after success.
//! 2. Inputs are read through [`StageWorkspace::upstream`], which resolves
//!    a logical artifact name to the producing stage's directory via the
//!    registry. There are no parallel copies of artifacts: the producing
//!    stage's directory is the single authoritative location.
//! 3. After a stage completes, [`StageWorkspace::snapshot_outputs`]
//!    enumerates the declared artifacts actually present; this listing is
//!    what the manifest and the cache see.

use std::path::{Path, PathBuf};
use subtitle_pipeline_domain::{ArtifactFileName, LanguageCode, PipelineError, StageDescriptor, StageRegistry};

/// Frozen per-invocation view of the filesystem contract.
#[derive(Debug, Clone)]
pub struct StageWorkspace {
    job_dir: PathBuf,
    descriptor: &'static StageDescriptor,
    stage_dir: PathBuf,
    /// The job's target languages; `{lang}` output patterns of
    /// non-fan-out stages (subtitle rendering emits one track per target
    /// in a single invocation) expand against this list.
    target_languages: Vec<LanguageCode>,
}

impl StageWorkspace {
    /// Creates the workspace for one stage invocation, creating
    /// `stage_dir` on demand.
    pub fn create(
        job_dir: &Path,
        descriptor: &'static StageDescriptor,
        target_languages: &[LanguageCode],
    ) -> Result<Self, PipelineError> {
        let stage_dir = job_dir.join(descriptor.dir_name());
        std::fs::create_dir_all(&stage_dir)?;
        Ok(Self {
            job_dir: job_dir.to_path_buf(),
            descriptor,
            stage_dir,
            target_languages: target_languages.to_vec(),
        })
    }

    pub fn target_languages(&self) -> &[LanguageCode] {
        &self.target_languages
    }

    /// Expands one declared output into the concrete file names this
    /// invocation must produce: fan-out units bind `{lang}` to their own
    /// language, everything else binds it once per job target.
    fn expand_output(&self, pattern: &str, lang: Option<&LanguageCode>) -> Vec<String> {
        if !pattern.contains("{lang}") {
            return vec![pattern.to_string()];
        }
        match lang {
            Some(lang) => vec![ArtifactFileName::expand_pattern(pattern, Some(lang.as_str()))],
            None => self
                .target_languages
                .iter()
                .map(|l| ArtifactFileName::expand_pattern(pattern, Some(l.as_str())))
                .collect(),
        }
    }

    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    pub fn stage_dir(&self) -> &Path {
        &self.stage_dir
    }

    pub fn descriptor(&self) -> &'static StageDescriptor {
        self.descriptor
    }

    /// Path of the per-stage log file receiving the child's output.
    pub fn log_path(&self) -> PathBuf {
        self.stage_dir.join("stage.log")
    }

    /// Path of the read-only config snapshot for this invocation.
    ///
    /// Fan-out units get per-language snapshots so each invocation sees
    /// its own target language.
    pub fn config_snapshot_path(&self, lang: Option<&LanguageCode>) -> PathBuf {
        let name = match lang {
            Some(lang) => format!("{}_config_{}.json", self.descriptor.name, lang),
            None => format!("{}_config.json", self.descriptor.name),
        };
        self.stage_dir.join(name)
    }

    /// Validates `name` and returns the path it may be created at.
    ///
    /// This is the only sanctioned creation point for stage outputs.
    pub fn open_output(&self, name: &str) -> Result<PathBuf, PipelineError> {
        let validated = ArtifactFileName::for_stage(self.descriptor.name, name)?;
        Ok(self.stage_dir.join(validated.as_str()))
    }

    /// Resolves a declared input's logical name to its path in the
    /// producing stage's directory.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when the stage did not declare the input,
    /// no stage produces it, or the producer's pattern is per-language
    /// and no language was given.
    pub fn upstream(&self, logical_name: &str, lang: Option<&LanguageCode>) -> Result<PathBuf, PipelineError> {
        if !self.descriptor.inputs.contains(&logical_name) {
            return Err(PipelineError::validation_error(format!(
                "stage '{}' does not declare input '{}'",
                self.descriptor.name, logical_name
            )));
        }
        let (producer, output) = StageRegistry::producer_of(logical_name).ok_or_else(|| {
            PipelineError::validation_error(format!("no stage produces '{}'", logical_name))
        })?;
        let file_name = ArtifactFileName::expand_pattern(output.pattern, lang.map(|l| l.as_str()));
        if file_name.contains("{lang}") {
            return Err(PipelineError::validation_error(format!(
                "input '{}' is per-language; a target language is required",
                logical_name
            )));
        }
        Ok(self.job_dir.join(producer.dir_name()).join(file_name))
    }

    /// Enumerates the declared outputs present in the stage directory.
    ///
    /// Returns `(logical_name, path)` pairs for artifacts that exist.
    pub fn snapshot_outputs(&self, lang: Option<&LanguageCode>) -> Vec<(String, PathBuf)> {
        let mut found = Vec::new();
        for output in self.descriptor.outputs {
            for name in self.expand_output(output.pattern, lang) {
                let path = self.stage_dir.join(&name);
                if path.exists() {
                    found.push((output.logical_name.to_string(), path));
                }
            }
        }
        found
    }

    /// Declared outputs missing from the stage directory.
    pub fn missing_outputs(&self, lang: Option<&LanguageCode>) -> Vec<String> {
        let mut missing = Vec::new();
        for output in self.descriptor.outputs {
            for name in self.expand_output(output.pattern, lang) {
                if !self.stage_dir.join(&name).exists() {
                    missing.push(name);
                }
            }
        }
        missing
    }

    /// Checks that every declared output exists and, for JSON artifacts,
    /// parses. Used by the failure classifier and the tolerated-crash
    /// rule.
    pub fn outputs_complete_and_parsable(&self, lang: Option<&LanguageCode>) -> Result<bool, PipelineError> {
        for output in self.descriptor.outputs {
            for name in self.expand_output(output.pattern, lang) {
                let path = self.stage_dir.join(&name);
                if !path.exists() {
                    return Ok(false);
                }
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    let content = std::fs::read_to_string(&path)?;
                    if serde_json::from_str::<serde_json::Value>(&content).is_err() {
                        return Ok(false);
                    }
                } else if std::fs::metadata(&path)?.len() == 0 {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace(stage: &str) -> (tempfile::TempDir, StageWorkspace) {
        workspace_with_targets(stage, &[])
    }

    fn workspace_with_targets(stage: &str, targets: &[&str]) -> (tempfile::TempDir, StageWorkspace) {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = StageRegistry::by_name(stage).unwrap();
        let targets: Vec<LanguageCode> = targets.iter().map(|t| LanguageCode::new(t).unwrap()).collect();
        let ws = StageWorkspace::create(dir.path(), descriptor, &targets).unwrap();
        (dir, ws)
    }

    #[test]
    fn test_stage_dir_uses_ordinal_prefix() {
        let (dir, ws) = workspace("asr");
        assert_eq!(ws.stage_dir(), dir.path().join("06_asr"));
        assert!(ws.stage_dir().is_dir());
    }

    #[test]
    fn test_open_output_enforces_filename_rule() {
        let (_dir, ws) = workspace("asr");
        assert!(ws.open_output("asr_segments.json").is_ok());
        assert!(ws.open_output("segments.json").is_err());
        assert!(ws.open_output("../asr_segments.json").is_err());
        assert!(ws.open_output("/tmp/asr_segments.json").is_err());
        assert!(ws.open_output(".asr_segments.json").is_err());
    }

    #[test]
    fn test_open_output_stays_inside_stage_dir() {
        let (_dir, ws) = workspace("vad");
        let path = ws.open_output("vad_segments.json").unwrap();
        assert!(path.starts_with(ws.stage_dir()));
    }

    #[test]
    fn test_upstream_resolves_producer_directory() {
        let (dir, ws) = workspace("asr");
        let audio = ws.upstream("audio", None).unwrap();
        assert_eq!(audio, dir.path().join("01_demux").join("demux_audio.wav"));
    }

    #[test]
    fn test_upstream_rejects_undeclared_inputs() {
        let (_dir, ws) = workspace("asr");
        assert!(ws.upstream("glossary_bundle", None).is_err());
    }

    #[test]
    fn test_upstream_expands_language_patterns() {
        let (dir, ws) = workspace("subtitle_generation");
        let lang = LanguageCode::new("gu").unwrap();
        let path = ws.upstream("translated_segments", Some(&lang)).unwrap();
        assert_eq!(
            path,
            dir.path().join("10_translation").join("translation_segments_gu.json")
        );
    }

    #[test]
    fn test_snapshot_lists_only_existing_declared_outputs() {
        let (_dir, ws) = workspace("alignment");
        assert!(ws.snapshot_outputs(None).is_empty());
        assert_eq!(ws.missing_outputs(None).len(), 2);

        std::fs::write(ws.stage_dir().join("alignment_segments.json"), b"{}").unwrap();
        let outputs = ws.snapshot_outputs(None);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].0, "aligned_segments");
        assert_eq!(ws.missing_outputs(None), vec!["alignment_transcript.txt"]);
    }

    #[test]
    fn test_outputs_complete_requires_parsable_json() {
        let (_dir, ws) = workspace("alignment");
        std::fs::write(ws.stage_dir().join("alignment_segments.json"), b"{\"words\":[]}").unwrap();
        std::fs::write(ws.stage_dir().join("alignment_transcript.txt"), b"hello world").unwrap();
        assert!(ws.outputs_complete_and_parsable(None).unwrap());

        std::fs::write(ws.stage_dir().join("alignment_segments.json"), b"{truncated").unwrap();
        assert!(!ws.outputs_complete_and_parsable(None).unwrap());
    }

    #[test]
    fn test_outputs_complete_rejects_empty_non_json() {
        let (_dir, ws) = workspace("alignment");
        std::fs::write(ws.stage_dir().join("alignment_segments.json"), b"{}").unwrap();
        std::fs::write(ws.stage_dir().join("alignment_transcript.txt"), b"").unwrap();
        assert!(!ws.outputs_complete_and_parsable(None).unwrap());
    }

    #[test]
    fn test_non_fan_out_language_patterns_expand_per_target() {
        // subtitle rendering emits every track in a single invocation
        let (_dir, ws) = workspace_with_targets("subtitle_generation", &["en", "gu"]);
        assert_eq!(
            ws.missing_outputs(None),
            vec!["subtitle_generation_en.srt", "subtitle_generation_gu.srt"]
        );

        std::fs::write(ws.stage_dir().join("subtitle_generation_en.srt"), b"1\n").unwrap();
        assert_eq!(ws.missing_outputs(None), vec!["subtitle_generation_gu.srt"]);
        assert!(!ws.outputs_complete_and_parsable(None).unwrap());

        std::fs::write(ws.stage_dir().join("subtitle_generation_gu.srt"), b"1\n").unwrap();
        assert!(ws.outputs_complete_and_parsable(None).unwrap());
        assert_eq!(ws.snapshot_outputs(None).len(), 2);
    }

    #[test]
    fn test_fan_out_unit_expands_only_its_own_language() {
        let (_dir, ws) = workspace_with_targets("translation", &["en", "gu"]);
        let en = LanguageCode::new("en").unwrap();
        let missing = ws.missing_outputs(Some(&en));
        assert_eq!(missing, vec!["translation_segments_en.json", "translation_text_en.txt"]);
    }

    #[test]
    fn test_upstream_per_language_input_requires_language() {
        let (_dir, ws) = workspace_with_targets("mux", &["en"]);
        assert!(ws.upstream("subtitle_tracks", None).is_err());
        let en = LanguageCode::new("en").unwrap();
        assert!(ws
            .upstream("subtitle_tracks", Some(&en))
            .unwrap()
            .ends_with("11_subtitle_generation/subtitle_generation_en.srt"));
    }
}
