// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Subtitle Pipeline
//!
//! The pipeline orchestrator for context-aware media transcription,
//! translation, and subtitling. Given a prepared job — one video, one
//! workflow, one language selection — it composes twelve independent
//! processing stages into a strictly sequential run with:
//!
//! - **Cache-aware execution**: every cacheable stage is keyed by a
//!   content-addressed fingerprint; a hit restores prior outputs instead
//!   of recomputing, which is where re-runs earn their 70-85 % speedup.
//! - **Stage isolation**: stages are opaque subprocesses confined to
//!   their own directories; a crashing backend is a classifiable local
//!   failure, not a pipeline crash.
//! - **Resumability**: the per-job manifest is the single authority for
//!   what already happened; re-running a job continues from the first
//!   unsatisfied stage and a completed job is a no-op.
//!
//! The crate is layered the usual way: `infrastructure` talks to the
//! filesystem and subprocesses, `application` drives the domain types
//! from `subtitle-pipeline-domain`, and the binary in `main.rs` maps CLI
//! commands onto use cases.

pub mod application;
pub mod infrastructure;
