// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Artifact File Names
//!
//! Every file a stage emits must be named `<stage>_<descriptor>.<ext>`.
//! The rule exists because the source system this pipeline replaced
//! accumulated hidden dotfiles (`.seg.json`) and order-sensitive prefixes
//! (`-English.srt`) that broke downstream globbing; names are therefore
//! validated at the only sanctioned creation point rather than by
//! convention.
//!
//! A name is valid when:
//!
//! - it begins with the producing stage's name followed by `_`
//! - it contains no path separators, no `..`, and is not absolute
//! - it does not start with `.` or `-`
//! - it ends in a non-empty extension

use crate::PipelineError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // stage prefix is checked separately; this covers the overall shape
    Regex::new(r"^[a-z0-9][a-z0-9_]*_[A-Za-z0-9][A-Za-z0-9._-]*\.[A-Za-z0-9]+$")
        .expect("artifact name pattern is valid")
});

/// A validated artifact file name, bound to the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactFileName(String);

impl ArtifactFileName {
    /// Validates `name` as an artifact file name for `stage`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when the name escapes the stage directory,
    /// lacks the stage prefix, or violates the filename shape.
    pub fn for_stage(stage: &str, name: &str) -> Result<Self, PipelineError> {
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(PipelineError::validation_error(format!(
                "artifact name '{}' must not contain path components",
                name
            )));
        }
        if name.starts_with('.') || name.starts_with('-') {
            return Err(PipelineError::validation_error(format!(
                "artifact name '{}' must not start with '.' or '-'",
                name
            )));
        }
        let prefix = format!("{}_", stage);
        if !name.starts_with(&prefix) {
            return Err(PipelineError::validation_error(format!(
                "artifact name '{}' must start with '{}'",
                name, prefix
            )));
        }
        if !NAME_PATTERN.is_match(name) {
            return Err(PipelineError::validation_error(format!(
                "artifact name '{}' does not match <stage>_<descriptor>.<ext>",
                name
            )));
        }
        Ok(ArtifactFileName(name.to_string()))
    }

    /// Returns the file name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Expands a declared output pattern for one target language.
    ///
    /// Patterns may carry a `{lang}` placeholder for per-language fan-out
    /// artifacts (`translation_text_{lang}.txt`).
    pub fn expand_pattern(pattern: &str, lang: Option<&str>) -> String {
        match lang {
            Some(lang) => pattern.replace("{lang}", lang),
            None => pattern.to_string(),
        }
    }
}

impl fmt::Display for ArtifactFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
