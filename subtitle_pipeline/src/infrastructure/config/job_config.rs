// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Configuration
//!
//! Layered configuration for one pipeline run. Two layers exist:
//!
//! 1. **Process defaults** — compiled-in `Default` impls, optionally
//!    overlaid by a `pipeline.toml` defaults file found by upward search
//!    from the working directory.
//! 2. **Job overrides** — the `[overrides]` table of the job descriptor.
//!
//! Overrides win on any key. Layering happens on untyped values before
//! deserialization, so a job can override a single key
//! (`asr.beam_size = 8`) without restating its section.
//!
//! The merged [`JobConfig`] is frozen: it is handed to the rest of the
//! system behind `Arc` with no mutable accessors, and each stage
//! invocation receives a read-only JSON snapshot of it on disk.
//!
//! ## Cache Contract
//!
//! [`JobConfig::fingerprint_value`] renders the canonical string for any
//! key a stage declares in `fingerprint_extras`. Every key that materially
//! affects a cacheable stage's output must be resolvable here AND declared
//! by the owning stage descriptor, or the cache will silently serve wrong
//! results. The registry's fingerprint-extras audit test pins this
//! relationship.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use subtitle_pipeline_domain::{NormalizationParams, PipelineError};

/// Audio extraction parameters applied by the demux stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub channels: u8,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
        }
    }
}

/// Optional clip bounds in seconds; participate in media identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipSettings {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

/// ASR stage parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AsrSettings {
    pub model_id: String,
    pub language_hint: Option<String>,
    pub device_preference: String,
    pub beam_size: u32,
}

impl Default for AsrSettings {
    fn default() -> Self {
        Self {
            model_id: "whisper-large-v3".to_string(),
            language_hint: None,
            device_preference: "auto".to_string(),
            beam_size: 5,
        }
    }
}

/// Alignment stage parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignSettings {
    pub enable: bool,
    pub model_id: String,
    /// Out-of-process fault containment for the aligner backend
    pub isolate_process: bool,
}

impl Default for AlignSettings {
    fn default() -> Self {
        Self {
            enable: true,
            model_id: "wav2vec2-large-xlsr".to_string(),
            isolate_process: true,
        }
    }
}

/// Vocal isolation parameters; `enabled: None` defers to the Indic
/// heuristic gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSeparationSettings {
    pub enabled: Option<bool>,
    pub model: String,
}

impl Default for SourceSeparationSettings {
    fn default() -> Self {
        Self {
            enabled: None,
            model: "htdemucs".to_string(),
        }
    }
}

/// Translation stage parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    /// Engine selection: auto, indic, or universal
    pub engine: String,
    pub model_id: String,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            engine: "auto".to_string(),
            model_id: "indictrans2".to_string(),
        }
    }
}

/// Artifact cache controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub root: PathBuf,
    pub max_bytes: u64,
    pub ttl_days: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            root: PathBuf::from("cache"),
            max_bytes: 50 * 1024 * 1024 * 1024,
            ttl_days: 30,
        }
    }
}

impl CacheSettings {
    /// Cache root with the `PIPELINE_CACHE_ROOT` environment override.
    pub fn resolved_root(&self) -> PathBuf {
        match std::env::var_os("PIPELINE_CACHE_ROOT") {
            Some(root) if !root.is_empty() => PathBuf::from(root),
            _ => self.root.clone(),
        }
    }
}

/// Stage runner controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Per-stage timeout overrides in seconds, keyed by stage name
    pub timeout_s: BTreeMap<String, u64>,
    /// Timeout for stages without an override
    pub default_timeout_s: u64,
    /// Grace period between SIGTERM and SIGKILL
    pub graceful_shutdown_s: u64,
    /// Directory containing the stage programs
    pub stages_root: PathBuf,
    /// Interpreter registry file
    pub environments_file: PathBuf,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            timeout_s: BTreeMap::new(),
            default_timeout_s: 3_600,
            graceful_shutdown_s: 10,
            stages_root: PathBuf::from("stages"),
            environments_file: PathBuf::from("environments.toml"),
        }
    }
}

impl RunnerSettings {
    /// Effective timeout for one stage.
    pub fn timeout_for(&self, stage: &str) -> std::time::Duration {
        let secs = self.timeout_s.get(stage).copied().unwrap_or(self.default_timeout_s);
        std::time::Duration::from_secs(secs)
    }
}

/// Glossary / context bundle input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlossarySettings {
    pub path: Option<PathBuf>,
}

/// External metadata enrichment (the one soft-failable stage).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbSettings {
    pub enabled: bool,
}

impl Default for TmdbSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Job directory allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsSettings {
    pub root: PathBuf,
}

impl Default for JobsSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("jobs"),
        }
    }
}

/// Language-set configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageSettings {
    /// ISO codes gating the source-separation heuristic
    pub indic: Vec<String>,
}

impl Default for LanguageSettings {
    fn default() -> Self {
        Self {
            indic: ["as", "bn", "gu", "hi", "kn", "ml", "mr", "ne", "or", "pa", "sa", "ta", "te", "ur"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// The merged, frozen configuration for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub audio: AudioSettings,
    pub clip: ClipSettings,
    pub asr: AsrSettings,
    pub align: AlignSettings,
    pub source_separation: SourceSeparationSettings,
    pub translation: TranslationSettings,
    pub cache: CacheSettings,
    pub runner: RunnerSettings,
    pub glossary: GlossarySettings,
    pub tmdb: TmdbSettings,
    pub jobs: JobsSettings,
    pub languages: LanguageSettings,
}

impl JobConfig {
    /// Canonical string value for a `fingerprint_extras` config key.
    ///
    /// Returns `None` for keys this configuration does not know; unset
    /// optional values render as `Some("")` so that setting them for the
    /// first time re-keys the owning stage.
    pub fn fingerprint_value(&self, key: &str) -> Option<String> {
        let render_f64 = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        match key {
            "audio.sample_rate" => Some(self.audio.sample_rate.to_string()),
            "audio.channels" => Some(self.audio.channels.to_string()),
            "clip.start" => Some(render_f64(self.clip.start)),
            "clip.end" => Some(render_f64(self.clip.end)),
            "asr.model_id" => Some(self.asr.model_id.clone()),
            "asr.language_hint" => Some(self.asr.language_hint.clone().unwrap_or_default()),
            "asr.device_preference" => Some(self.asr.device_preference.clone()),
            "asr.beam_size" => Some(self.asr.beam_size.to_string()),
            "align.enable" => Some(self.align.enable.to_string()),
            "align.model_id" => Some(self.align.model_id.clone()),
            "source_separation.enabled" => Some(
                self.source_separation
                    .enabled
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            ),
            "source_separation.model" => Some(self.source_separation.model.clone()),
            "translation.engine" => Some(self.translation.engine.clone()),
            "translation.model_id" => Some(self.translation.model_id.clone()),
            _ => None,
        }
    }

    /// Normalization parameters bound into the media fingerprint.
    pub fn normalization_params(&self) -> NormalizationParams {
        NormalizationParams {
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            start: self.clip.start,
            end: self.clip.end,
            codec_request: None,
        }
    }

    /// Serializes the frozen view to canonical JSON for stage snapshots.
    pub fn snapshot_json(&self) -> Result<String, PipelineError> {
        serde_json::to_string_pretty(self).map_err(PipelineError::from)
    }

    /// Validates cross-key consistency after merging.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.audio.sample_rate < 8_000 || self.audio.sample_rate > 192_000 {
            return Err(PipelineError::invalid_config(format!(
                "audio.sample_rate {} is outside 8000..=192000",
                self.audio.sample_rate
            )));
        }
        if self.audio.channels == 0 || self.audio.channels > 2 {
            return Err(PipelineError::invalid_config(
                "audio.channels must be 1 or 2".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.clip.start, self.clip.end) {
            if end <= start {
                return Err(PipelineError::invalid_config(format!(
                    "clip.end {} must be after clip.start {}",
                    end, start
                )));
            }
        }
        if !["auto", "indic", "universal"].contains(&self.translation.engine.as_str()) {
            return Err(PipelineError::invalid_config(format!(
                "translation.engine '{}' must be auto, indic, or universal",
                self.translation.engine
            )));
        }
        if self.runner.graceful_shutdown_s == 0 {
            return Err(PipelineError::invalid_config(
                "runner.graceful_shutdown_s must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads and merges configuration layers.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Name of the optional process defaults file.
    pub const DEFAULTS_FILE: &'static str = "pipeline.toml";

    /// Searches for `pipeline.toml` in the working directory and up to
    /// three parents.
    pub fn find_defaults_file() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        for _ in 0..4 {
            let candidate = current.join(Self::DEFAULTS_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                break;
            }
        }
        None
    }

    /// Builds the frozen configuration for one job.
    ///
    /// Layer order: compiled defaults ← defaults file ← job overrides.
    /// Layering happens on untyped values so an override can touch one
    /// leaf key without restating its section.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when a layer fails to parse or the
    /// merged result fails validation.
    pub fn load(
        defaults_file: Option<&Path>,
        job_overrides: Option<&toml::Value>,
    ) -> Result<JobConfig, PipelineError> {
        let mut layered = serde_json::to_value(JobConfig::default()).map_err(|e| {
            PipelineError::invalid_config(format!("failed to encode compiled defaults: {}", e))
        })?;

        if let Some(path) = defaults_file {
            let content = std::fs::read_to_string(path).map_err(|e| {
                PipelineError::invalid_config(format!("failed to read {}: {}", path.display(), e))
            })?;
            let value: serde_json::Value = toml::from_str(&content).map_err(|e| {
                PipelineError::invalid_config(format!("failed to parse {}: {}", path.display(), e))
            })?;
            Self::merge_into(&mut layered, &value);
        }

        if let Some(overrides) = job_overrides {
            let value = serde_json::to_value(overrides).map_err(|e| {
                PipelineError::invalid_config(format!("failed to encode job overrides: {}", e))
            })?;
            Self::merge_into(&mut layered, &value);
        }

        let config: JobConfig = serde_json::from_value(layered).map_err(|e| {
            PipelineError::invalid_config(format!("merged configuration is invalid: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Deep-merges `overlay` into `base`; overlay wins on every leaf key.
    fn merge_into(base: &mut serde_json::Value, overlay: &serde_json::Value) {
        match (base, overlay) {
            (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
                for (key, overlay_value) in overlay_map {
                    match base_map.get_mut(key) {
                        Some(base_value) if base_value.is_object() && overlay_value.is_object() => {
                            Self::merge_into(base_value, overlay_value);
                        }
                        _ => {
                            base_map.insert(key.clone(), overlay_value.clone());
                        }
                    }
                }
            }
            (base, overlay) => *base = overlay.clone(),
        }
    }
}
