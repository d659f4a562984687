// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Workflow Selection
//!
//! The workflow chosen at job submission decides which of the twelve stages
//! are mandatory and which are pruned by the planner. Three workflows exist:
//!
//! | Workflow | Final artifact |
//! |---|---|
//! | `transcribe` | Plain source-language transcript |
//! | `translate` | Translated transcript (exactly one target language) |
//! | `subtitle` | Video container with one soft subtitle track per target |

use crate::PipelineError;
use serde::{Deserialize, Serialize};

/// The three supported pipeline workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Workflow {
    /// Produce a plain transcript in the source language
    Transcribe,
    /// Produce a translated transcript for a single target language
    Translate,
    /// Produce a video with soft-embedded subtitle tracks
    Subtitle,
}

impl Workflow {
    /// All workflows, in declaration order.
    pub const ALL: [Workflow; 3] = [Workflow::Transcribe, Workflow::Translate, Workflow::Subtitle];

    /// Whether this workflow translates into target languages at all.
    pub fn translates(&self) -> bool {
        matches!(self, Workflow::Translate | Workflow::Subtitle)
    }

    /// Maximum number of target languages the workflow accepts.
    ///
    /// `translate` is clamped to one target; `subtitle` renders one track
    /// per target; `transcribe` takes none.
    pub fn max_target_languages(&self) -> usize {
        match self {
            Workflow::Transcribe => 0,
            Workflow::Translate => 1,
            Workflow::Subtitle => usize::MAX,
        }
    }
}

impl std::fmt::Display for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Workflow::Transcribe => write!(f, "transcribe"),
            Workflow::Translate => write!(f, "translate"),
            Workflow::Subtitle => write!(f, "subtitle"),
        }
    }
}

impl std::str::FromStr for Workflow {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transcribe" => Ok(Workflow::Transcribe),
            "translate" => Ok(Workflow::Translate),
            "subtitle" => Ok(Workflow::Subtitle),
            _ => Err(PipelineError::ValidationError(format!(
                "Unknown workflow: {} (expected transcribe, translate, or subtitle)",
                s
            ))),
        }
    }
}
