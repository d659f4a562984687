// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Management
//!
//! Process exit codes for the pipeline CLI. The pipeline-specific codes are
//! part of the external contract consumed by batch wrappers:
//!
//! - **0** — run completed
//! - **2** — partial: a required stage failed, resume will continue
//! - **3** — failed before any stage ran (unreadable media, bad config)
//! - **130** — cancelled by SIGINT
//!
//! The remaining values follow BSD `sysexits.h` conventions for generic
//! CLI failures.

use std::fmt;

/// Exit codes for the pipeline CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Run completed; all planned stages satisfied (0)
    #[default]
    Completed = 0,

    /// General error (1)
    Error = 1,

    /// Partial completion: a required stage failed, state is resumable (2)
    Partial = 2,

    /// Failed before the first stage could run (3)
    /// - Media unreadable
    /// - Job descriptor or configuration malformed
    /// - Job directory locked by another orchestrator
    InputInvalid = 3,

    /// Command line usage error (64)
    UsageError = 64,

    /// Configuration error outside a job context (78)
    Config = 78,

    /// Interrupted by signal (SIGINT - Ctrl+C) (130)
    Interrupted = 130,

    /// Terminated by signal (SIGTERM) (143)
    Terminated = 143,
}

impl ExitCode {
    /// Convert to i32 for use with std::process::exit
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get human-readable description of exit code
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Completed => "Completed",
            ExitCode::Error => "General error",
            ExitCode::Partial => "Partial completion (resumable)",
            ExitCode::InputInvalid => "Failed before first stage",
            ExitCode::UsageError => "Command line usage error",
            ExitCode::Config => "Configuration error",
            ExitCode::Interrupted => "Interrupted by signal (SIGINT)",
            ExitCode::Terminated => "Terminated by signal (SIGTERM)",
        }
    }

    /// Check if this is a success exit code
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Completed)
    }

    /// Check if this represents a signal interruption
    pub fn is_signal(self) -> bool {
        matches!(self, ExitCode::Interrupted | ExitCode::Terminated)
    }

    /// Check if the job state is worth resuming
    pub fn is_resumable(self) -> bool {
        matches!(self, ExitCode::Partial | ExitCode::Interrupted | ExitCode::Terminated)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_codes() {
        assert_eq!(ExitCode::Completed.as_i32(), 0);
        assert_eq!(ExitCode::Partial.as_i32(), 2);
        assert_eq!(ExitCode::InputInvalid.as_i32(), 3);
        assert_eq!(ExitCode::Interrupted.as_i32(), 130);
    }

    #[test]
    fn test_is_success() {
        assert!(ExitCode::Completed.is_success());
        assert!(!ExitCode::Partial.is_success());
        assert!(!ExitCode::Error.is_success());
    }

    #[test]
    fn test_is_signal() {
        assert!(ExitCode::Interrupted.is_signal());
        assert!(ExitCode::Terminated.is_signal());
        assert!(!ExitCode::Partial.is_signal());
    }

    #[test]
    fn test_resumable_states() {
        assert!(ExitCode::Partial.is_resumable());
        assert!(ExitCode::Interrupted.is_resumable());
        assert!(!ExitCode::Completed.is_resumable());
        assert!(!ExitCode::InputInvalid.is_resumable());
    }

    #[test]
    fn test_default() {
        assert_eq!(ExitCode::default(), ExitCode::Completed);
    }

    #[test]
    fn test_display() {
        let display = format!("{}", ExitCode::Partial);
        assert!(display.contains("Partial"));
        assert!(display.contains('2'));
    }

    #[test]
    fn test_conversion_to_i32() {
        let code: i32 = ExitCode::InputInvalid.into();
        assert_eq!(code, 3);
    }
}
