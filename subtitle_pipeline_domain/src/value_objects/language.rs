// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Language Codes
//!
//! ISO-639 language codes as used for source and target languages. The
//! sentinel value `auto` requests source-language detection by the ASR
//! stage and is only valid as a source language.
//!
//! Codes participate in stage fingerprints (a translation for `gu` is a
//! different computation than one for `en`), so they are normalized to
//! lowercase at construction and never mutated afterwards.

use crate::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated two- or three-letter language code, or `auto`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    /// The detection sentinel, valid only as a source language.
    pub fn auto() -> Self {
        LanguageCode("auto".to_string())
    }

    /// Parses and normalizes a language code.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` unless the input is `auto` or 2-3 ASCII
    /// letters.
    pub fn new(code: &str) -> Result<Self, PipelineError> {
        let normalized = code.trim().to_lowercase();
        if normalized == "auto" {
            return Ok(LanguageCode(normalized));
        }
        if !(2..=3).contains(&normalized.len()) || !normalized.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(PipelineError::validation_error(format!(
                "'{}' is not an ISO-639 language code",
                code
            )));
        }
        Ok(LanguageCode(normalized))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the `auto` detection sentinel.
    pub fn is_auto(&self) -> bool {
        self.0 == "auto"
    }

    /// Deduplicates a target-language list, preserving first-seen order.
    pub fn dedup_ordered(codes: &[LanguageCode]) -> Vec<LanguageCode> {
        let mut seen = std::collections::HashSet::new();
        codes
            .iter()
            .filter(|c| seen.insert((*c).clone()))
            .cloned()
            .collect()
    }
}

impl FromStr for LanguageCode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LanguageCode::new(s)
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        LanguageCode::new(&value)
    }
}

impl From<LanguageCode> for String {
    fn from(code: LanguageCode) -> String {
        code.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
