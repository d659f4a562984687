// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # DateTime Serde Module
//!
//! RFC3339 serialization and deserialization for `DateTime<Utc>` fields.
//! Manifest and cache-entry timestamps must be readable by external tools,
//! so everything is normalized to UTC and rendered as RFC3339 strings
//! (`2025-06-14T10:30:45.123Z`) rather than chrono's default representation.
//!
//! Use with the serde `with` attribute:
//!
//! ```ignore
//! #[serde(with = "datetime_serde")]
//! started_at: chrono::DateTime<chrono::Utc>,
//! #[serde(with = "datetime_serde::optional")]
//! ended_at: Option<chrono::DateTime<chrono::Utc>>,
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Serializes a `DateTime<Utc>` to an RFC3339 string.
pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&dt.to_rfc3339())
}

/// Deserializes an RFC3339 string to a UTC `DateTime`.
///
/// Accepts any RFC3339 offset and normalizes to UTC; rejects anything
/// else with a descriptive error.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

/// RFC3339 serialization for `Option<DateTime<Utc>>` fields.
pub mod optional {
    use super::*;

    pub fn serialize<S>(opt_dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match opt_dt {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt_s: Option<String> = Option::deserialize(deserializer)?;
        match opt_s {
            Some(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
