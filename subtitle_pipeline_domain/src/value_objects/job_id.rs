// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Identifier
//!
//! Type-safe job identifier in the `YYYYMMDD-<user>-<seq>` form, e.g.
//! `20250614-priya-003`. The identifier doubles as the job directory name,
//! so the character set is restricted to names that are safe on every
//! supported filesystem.
//!
//! ## Format
//!
//! - **date** — eight digits, the local date the job was prepared
//! - **user** — lowercase alphanumerics and underscores, 1–32 chars
//! - **sequence** — three digits, allocated per (date, user) pair
//!
//! Identifiers are allocated by the `prepare` use case and never reused;
//! equality is plain string equality.

use crate::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Validated job identifier.
///
/// Construct via [`JobId::new`] from parts or parse an existing identifier
/// with [`FromStr`]. The inner string is immutable once validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Creates a job id from its parts.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the user segment is empty, longer than
    /// 32 characters, or contains characters outside `[a-z0-9_]`, or if the
    /// sequence does not fit in three digits.
    pub fn new(date: chrono::NaiveDate, user: &str, sequence: u16) -> Result<Self, PipelineError> {
        if user.is_empty() || user.len() > 32 {
            return Err(PipelineError::validation_error(format!(
                "job id user segment must be 1-32 characters, got {}",
                user.len()
            )));
        }
        if !user.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return Err(PipelineError::validation_error(format!(
                "job id user segment '{}' contains characters outside [a-z0-9_]",
                user
            )));
        }
        if sequence > 999 {
            return Err(PipelineError::validation_error(format!(
                "job id sequence {} exceeds 999",
                sequence
            )));
        }
        Ok(JobId(format!("{}-{}-{:03}", date.format("%Y%m%d"), user, sequence)))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the date segment.
    pub fn date(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }

    /// Returns the user segment.
    pub fn user(&self) -> &str {
        self.0.split('-').nth(1).unwrap_or_default()
    }

    /// Returns the numeric sequence segment.
    pub fn sequence(&self) -> u16 {
        self.0
            .rsplit('-')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for JobId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 3 {
            return Err(PipelineError::validation_error(format!(
                "job id '{}' is not in YYYYMMDD-user-seq form",
                s
            )));
        }
        let date = chrono::NaiveDate::parse_from_str(parts[0], "%Y%m%d").map_err(|_| {
            PipelineError::validation_error(format!("job id '{}' has an invalid date segment", s))
        })?;
        let sequence: u16 = parts[2]
            .parse()
            .ok()
            .filter(|_| parts[2].len() == 3)
            .ok_or_else(|| {
                PipelineError::validation_error(format!(
                    "job id '{}' has an invalid sequence segment",
                    s
                ))
            })?;
        JobId::new(date, parts[1], sequence)
    }
}

impl TryFrom<String> for JobId {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> String {
        id.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(2025, 6, 14).unwrap()
    }

    #[test]
    fn test_new_formats_sequence_with_leading_zeros() {
        let id = JobId::new(date(), "priya", 3).unwrap();
        assert_eq!(id.as_str(), "20250614-priya-003");
        assert_eq!(id.date(), "20250614");
        assert_eq!(id.user(), "priya");
        assert_eq!(id.sequence(), 3);
    }

    #[test]
    fn test_parse_round_trip() {
        let id: JobId = "20250614-batch_runner-042".parse().unwrap();
        assert_eq!(id.user(), "batch_runner");
        assert_eq!(id.sequence(), 42);
        assert_eq!(id.to_string().parse::<JobId>().unwrap(), id);
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert!("nonsense".parse::<JobId>().is_err());
        assert!("2025061-priya-003".parse::<JobId>().is_err());
        assert!("20250614-priya-3".parse::<JobId>().is_err());
        assert!("20250614-Priya-003".parse::<JobId>().is_err());
        assert!("20250614--003".parse::<JobId>().is_err());
    }

    #[test]
    fn test_rejects_invalid_parts() {
        assert!(JobId::new(date(), "", 1).is_err());
        assert!(JobId::new(date(), "user with spaces", 1).is_err());
        assert!(JobId::new(date(), "ok", 1000).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let id: JobId = "20250614-priya-001".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"20250614-priya-001\"");
        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<JobId>("\"bogus\"").is_err());
    }
}
