// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Workflow Planner
//!
//! Given a workflow and the job's configuration view, the planner
//! materializes the ordered subset of stages to execute. The plan is frozen
//! before execution begins; nothing replans mid-run.
//!
//! ## Algorithm
//!
//! 1. Take all twelve stages in ordinal order.
//! 2. Drop stages whose `mandatory_for` set excludes the workflow.
//! 3. Evaluate gating predicates on the survivors; gate-skipped stages stay
//!   in the plan as `skipped` entries so the manifest records why.
//! 4. For `translate`, clamp the target list to its first language and
//!   record a warning when more were supplied.
//! 5. Expand per-target-language stages into one invocation unit per
//!   effective target (`translation.en`, `translation.gu`, …).
//!
//! The old system scheduled a translate-to-source pass on transcribe jobs
//! through a mis-routed workflow flag; pruning by `mandatory_for` makes
//! that unrepresentable — transcribe plans simply contain no stage 10.

use crate::registry::{StageDescriptor, StageGate, StageRegistry};
use crate::value_objects::{LanguageCode, Workflow};
use crate::PipelineError;

/// Configuration view the planner needs; a deliberately narrow slice of
/// the job config so the domain stays decoupled from the config layer.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub workflow: Workflow,
    pub source_language: LanguageCode,
    pub target_languages: Vec<LanguageCode>,
    /// Explicit `source_separation.enabled` override; `None` = heuristic
    pub source_separation_enabled: Option<bool>,
    /// The configured Indic language set driving the stage-04 heuristic
    pub indic_languages: Vec<String>,
}

/// Whether a planned stage executes or is recorded as skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanDecision {
    Scheduled,
    Skipped { reason: String },
}

/// One stage's entry in a frozen plan.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub descriptor: &'static StageDescriptor,
    pub decision: PlanDecision,
}

/// One runnable unit: a stage, or one language of a fan-out stage.
#[derive(Debug, Clone)]
pub struct InvocationUnit {
    pub descriptor: &'static StageDescriptor,
    /// Target language for fan-out units
    pub language: Option<LanguageCode>,
}

impl InvocationUnit {
    /// Manifest key: the stage name, or `<name>.<lang>` for fan-out units.
    pub fn manifest_key(&self) -> String {
        match &self.language {
            Some(lang) => format!("{}.{}", self.descriptor.name, lang),
            None => self.descriptor.name.to_string(),
        }
    }
}

/// The frozen output of one planning pass.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    workflow: Workflow,
    entries: Vec<PlanEntry>,
    effective_targets: Vec<LanguageCode>,
    warnings: Vec<String>,
}

impl ExecutionPlan {
    pub fn workflow(&self) -> Workflow {
        self.workflow
    }

    /// All entries in ordinal order, scheduled and skipped alike.
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Entries that will actually execute.
    pub fn scheduled(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.decision == PlanDecision::Scheduled)
    }

    /// Gate-skipped entries with their reasons.
    pub fn skipped(&self) -> impl Iterator<Item = (&PlanEntry, &str)> {
        self.entries.iter().filter_map(|e| match &e.decision {
            PlanDecision::Skipped { reason } => Some((e, reason.as_str())),
            PlanDecision::Scheduled => None,
        })
    }

    /// Target languages after workflow clamping.
    pub fn effective_targets(&self) -> &[LanguageCode] {
        &self.effective_targets
    }

    /// Warnings produced during planning (e.g. translate-target clamping).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Expands scheduled entries into runnable invocation units, fanning
    /// out per-target-language stages.
    pub fn invocation_units(&self) -> Vec<InvocationUnit> {
        let mut units = Vec::new();
        for entry in self.scheduled() {
            if entry.descriptor.per_target_language {
                for lang in &self.effective_targets {
                    units.push(InvocationUnit {
                        descriptor: entry.descriptor,
                        language: Some(lang.clone()),
                    });
                }
            } else {
                units.push(InvocationUnit {
                    descriptor: entry.descriptor,
                    language: None,
                });
            }
        }
        units
    }

    /// Manifest keys of every runnable unit, in execution order.
    pub fn unit_keys(&self) -> Vec<String> {
        self.invocation_units().iter().map(|u| u.manifest_key()).collect()
    }
}

/// Stateless planning service.
pub struct WorkflowPlanner;

impl WorkflowPlanner {
    /// Produces the frozen execution plan for one job.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when a translating workflow has no target
    /// languages (the job entity normally prevents this, but the planner
    /// re-checks because plans can be built from deserialized descriptors).
    pub fn plan(request: &PlanRequest) -> Result<ExecutionPlan, PipelineError> {
        if request.workflow.translates() && request.target_languages.is_empty() {
            return Err(PipelineError::validation_error(format!(
                "workflow '{}' has no target languages to plan for",
                request.workflow
            )));
        }

        let mut warnings = Vec::new();
        let effective_targets = Self::clamp_targets(request, &mut warnings);

        let mut entries = Vec::new();
        for descriptor in StageRegistry::all() {
            if !descriptor.is_mandatory_for(request.workflow) {
                continue;
            }
            let decision = match descriptor.gate {
                Some(gate) => Self::evaluate_gate(gate, request),
                None => PlanDecision::Scheduled,
            };
            entries.push(PlanEntry { descriptor, decision });
        }

        Ok(ExecutionPlan {
            workflow: request.workflow,
            entries,
            effective_targets,
            warnings,
        })
    }

    fn clamp_targets(request: &PlanRequest, warnings: &mut Vec<String>) -> Vec<LanguageCode> {
        let max = request.workflow.max_target_languages();
        if request.target_languages.len() > max {
            let kept = request.target_languages[..max.min(request.target_languages.len())].to_vec();
            warnings.push(format!(
                "workflow '{}' accepts {} target language(s); keeping {} and dropping {}",
                request.workflow,
                max,
                kept.iter().map(|l| l.as_str()).collect::<Vec<_>>().join(","),
                request.target_languages[max..]
                    .iter()
                    .map(|l| l.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            ));
            kept
        } else {
            request.target_languages.clone()
        }
    }

    fn evaluate_gate(gate: StageGate, request: &PlanRequest) -> PlanDecision {
        match gate {
            StageGate::SourceSeparationHeuristic => {
                if let Some(explicit) = request.source_separation_enabled {
                    if explicit {
                        PlanDecision::Scheduled
                    } else {
                        PlanDecision::Skipped {
                            reason: "gate: source_separation.enabled is false".to_string(),
                        }
                    }
                } else if request.source_language.is_auto() {
                    // Heuristic needs a known source language; auto defers
                    // to ASR detection which runs later than this gate.
                    PlanDecision::Skipped {
                        reason: "gate: source language is auto; separation heuristic undecidable".to_string(),
                    }
                } else if request
                    .indic_languages
                    .iter()
                    .any(|l| l == request.source_language.as_str())
                {
                    PlanDecision::Scheduled
                } else {
                    PlanDecision::Skipped {
                        reason: format!(
                            "gate: source language '{}' not in the Indic set",
                            request.source_language
                        ),
                    }
                }
            }
        }
    }
}
