// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Fingerprint
//!
//! A stage fingerprint identifies the exact (input, parameters) pair a
//! cacheable stage was asked to compute. It is derived from:
//!
//! - the media fingerprint's identity digest
//! - the stage name
//! - the values of that stage's declared `fingerprint_extras` config keys
//! - the stage's declared model identifier, when it has one
//! - the target language, for per-language fan-out invocations
//!
//! Extras are folded in as a sorted key/value sequence, so the derivation is
//! independent of configuration iteration order. Any configuration key that
//! materially changes a cacheable stage's output must be declared in that
//! stage's `fingerprint_extras`, or the cache will silently serve results
//! computed under different parameters.

use crate::value_objects::{LanguageCode, MediaFingerprint};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Content-addressed cache key for one stage invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageFingerprint(String);

impl StageFingerprint {
    /// Derives the fingerprint for one stage invocation.
    ///
    /// `extras` maps the stage's `fingerprint_extras` keys to their
    /// canonical string values; keys whose value is unset are folded in as
    /// the empty string so that setting a key for the first time re-keys
    /// the stage.
    pub fn derive(
        media: &MediaFingerprint,
        stage_name: &str,
        extras: &BTreeMap<String, String>,
        model_id: Option<&str>,
        target_language: Option<&LanguageCode>,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(media.identity_digest().as_bytes());
        hasher.update(b"\x00");
        hasher.update(stage_name.as_bytes());
        hasher.update(b"\x00");
        for (key, value) in extras {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\x1f");
        }
        hasher.update(b"\x00");
        if let Some(model) = model_id {
            hasher.update(model.as_bytes());
        }
        hasher.update(b"\x00");
        if let Some(lang) = target_language {
            hasher.update(lang.as_str().as_bytes());
        }
        StageFingerprint(hex::encode(hasher.finalize()))
    }

    /// Returns the fingerprint as a hex string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First twelve hex digits, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for StageFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
