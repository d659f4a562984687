// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Environment Registry
//!
//! Resolves a stage's logical environment label (`asr_env`,
//! `translate_env`, …) to a concrete interpreter binary, and a stage name
//! to its program file. The mapping lives in a TOML registry file:
//!
//! ```toml
//! [environments]
//! asr_env = "/opt/venvs/asr/bin/python3"
//! translate_env = "/opt/venvs/translate/bin/python3"
//!
//! [scripts]
//! # optional per-stage overrides; default is <stages_root>/<stage>.py
//! asr = "stages/asr_main.py"
//! ```
//!
//! A per-stage environment variable `PIPELINE_ENV_<STAGE>` (stage name
//! uppercased) overrides the registry, which is how deployments pin a
//! single stage to a different interpreter without editing the file.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use subtitle_pipeline_domain::{PipelineError, StageDescriptor};

#[derive(Debug, Deserialize)]
struct RegistryFile {
    environments: BTreeMap<String, PathBuf>,
    #[serde(default)]
    scripts: BTreeMap<String, PathBuf>,
}

/// Loaded interpreter/script resolution table.
#[derive(Debug, Clone)]
pub struct EnvironmentRegistry {
    environments: BTreeMap<String, PathBuf>,
    scripts: BTreeMap<String, PathBuf>,
    stages_root: PathBuf,
}

impl EnvironmentRegistry {
    /// Loads the registry file.
    ///
    /// # Errors
    ///
    /// Returns `EnvironmentError` when the file is missing or malformed;
    /// no stage can run without interpreter resolution.
    pub fn load(registry_file: &Path, stages_root: PathBuf) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(registry_file).map_err(|e| {
            PipelineError::EnvironmentError(format!(
                "cannot read environment registry {}: {}",
                registry_file.display(),
                e
            ))
        })?;
        let file: RegistryFile = toml::from_str(&content).map_err(|e| {
            PipelineError::EnvironmentError(format!(
                "malformed environment registry {}: {}",
                registry_file.display(),
                e
            ))
        })?;
        Ok(Self {
            environments: file.environments,
            scripts: file.scripts,
            stages_root,
        })
    }

    /// Builds a registry directly from maps (tests and embedded setups).
    pub fn from_parts(
        environments: BTreeMap<String, PathBuf>,
        scripts: BTreeMap<String, PathBuf>,
        stages_root: PathBuf,
    ) -> Self {
        Self {
            environments,
            scripts,
            stages_root,
        }
    }

    /// Resolves the interpreter for one stage.
    ///
    /// Resolution order: `PIPELINE_ENV_<STAGE>` environment variable, then
    /// the registry's `[environments]` table.
    pub fn interpreter_for(&self, descriptor: &StageDescriptor) -> Result<PathBuf, PipelineError> {
        let var = format!("PIPELINE_ENV_{}", descriptor.name.to_uppercase());
        if let Some(value) = std::env::var_os(&var) {
            if !value.is_empty() {
                return Ok(PathBuf::from(value));
            }
        }
        self.environments
            .get(descriptor.environment)
            .cloned()
            .ok_or_else(|| {
                PipelineError::EnvironmentError(format!(
                    "no interpreter registered for environment '{}' (stage '{}')",
                    descriptor.environment, descriptor.name
                ))
            })
    }

    /// Resolves the program file for one stage.
    pub fn script_for(&self, descriptor: &StageDescriptor) -> PathBuf {
        self.scripts
            .get(descriptor.name)
            .cloned()
            .unwrap_or_else(|| self.stages_root.join(format!("{}.py", descriptor.name)))
    }
}
