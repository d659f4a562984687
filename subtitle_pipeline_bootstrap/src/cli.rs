// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CLI Parser
//!
//! Command-line interface parsing using clap. This module only defines the
//! surface; validation beyond syntax (job ids, language codes, workflow
//! names) happens in the application layer where the domain types live.
//!
//! Two entry points exist: `prepare` builds a job descriptor and
//! directory, `run` drives the orchestrator against an existing job. The
//! split keeps `run` re-invocable: resume is just running the same job id
//! again.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure
#[derive(Parser, Debug, Clone)]
#[command(name = "subtitle-pipeline")]
#[command(about = concat!("Context-aware media subtitling pipeline v", env!("CARGO_PKG_VERSION")))]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Defaults file path (overrides the pipeline.toml search)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create a job directory and descriptor for a media file
    Prepare {
        /// Path to the source media file
        #[arg(short, long)]
        media: PathBuf,

        /// Workflow: transcribe, translate, or subtitle
        #[arg(short, long)]
        workflow: String,

        /// Source language ISO code, or "auto"
        #[arg(short, long, default_value = "auto")]
        source_language: String,

        /// Target language ISO code (repeatable, ordered)
        #[arg(short, long = "target-language")]
        target_languages: Vec<String>,

        /// User segment of the job id (defaults to $USER)
        #[arg(long)]
        user: Option<String>,

        /// Clip start offset in seconds
        #[arg(long)]
        start: Option<f64>,

        /// Clip end offset in seconds
        #[arg(long)]
        end: Option<f64>,

        /// Media duration in seconds, when known (informational)
        #[arg(long)]
        duration: Option<f64>,

        /// Record the job with debug logging enabled
        #[arg(long)]
        debug: bool,
    },

    /// Run (or resume) a prepared job through the pipeline
    Run {
        /// Job identifier from `prepare`
        #[arg(long)]
        job_id: String,

        /// Force DEBUG logging on stderr for this run
        #[arg(long)]
        debug: bool,

        /// Continue a partially-completed job (no-op when already complete)
        #[arg(long)]
        resume: bool,
    },

    /// Show the manifest summary of a job
    Status {
        /// Job identifier
        #[arg(long)]
        job_id: String,
    },

    /// Evict expired and over-budget artifact cache entries
    CacheGc,
}
