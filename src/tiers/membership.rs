//! Membership records
//!
//! Backend rows arrive loosely typed. They are validated once here, and only
//! a valid [`MembershipRecord`] reaches the tier resolver.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MembershipError {
    #[error("Membership row has no tier")]
    MissingTier,

    #[error("Invalid {field} timestamp: '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("Trial ends before it starts")]
    TrialWindowInverted,
}

/// Membership row as returned by the backend
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMembership {
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub trial_start: Option<String>,
    #[serde(default)]
    pub trial_end: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Validated membership record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipRecord {
    /// Raw tier name, trimmed and lowercased
    pub tier: String,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub status: String,
}

impl MembershipRecord {
    pub fn new(tier: impl Into<String>) -> Self {
        Self {
            tier: tier.into().trim().to_ascii_lowercase(),
            trial_start: None,
            trial_end: None,
            status: "active".to_string(),
        }
    }

    /// A `trial` record ending at `trial_end`
    pub fn trial(trial_start: Option<DateTime<Utc>>, trial_end: Option<DateTime<Utc>>) -> Self {
        Self {
            trial_start,
            trial_end,
            ..Self::new("trial")
        }
    }

    pub fn is_trial(&self) -> bool {
        self.tier == "trial"
    }
}

impl TryFrom<RawMembership> for MembershipRecord {
    type Error = MembershipError;

    fn try_from(raw: RawMembership) -> Result<Self, Self::Error> {
        let tier = raw
            .tier
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .ok_or(MembershipError::MissingTier)?;

        let trial_start = parse_timestamp("trial_start", raw.trial_start.as_deref())?;
        let trial_end = parse_timestamp("trial_end", raw.trial_end.as_deref())?;

        if let (Some(start), Some(end)) = (trial_start, trial_end) {
            if end < start {
                return Err(MembershipError::TrialWindowInverted);
            }
        }

        let status = raw
            .status
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "active".to_string());

        Ok(Self {
            tier,
            trial_start,
            trial_end,
            status,
        })
    }
}

/// Parse an RFC 3339 timestamp, or a zone-less Postgres timestamp taken as UTC
fn parse_timestamp(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, MembershipError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| MembershipError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(json: &str) -> RawMembership {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_valid_trial_row() {
        let record = MembershipRecord::try_from(raw(
            r#"{"tier": "Trial", "trial_start": "2025-01-01T00:00:00+00:00",
                "trial_end": "2025-01-15T00:00:00Z", "status": "active"}"#,
        ))
        .unwrap();

        assert!(record.is_trial());
        assert_eq!(
            record.trial_end,
            Some(Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_postgres_timestamp_without_zone() {
        let record = MembershipRecord::try_from(raw(
            r#"{"tier": "trial", "trial_end": "2025-03-01 12:30:00.123"}"#,
        ))
        .unwrap();
        assert_eq!(
            record.trial_end.map(|t| t.date_naive().to_string()),
            Some("2025-03-01".to_string())
        );
        assert_eq!(record.status, "active");
    }

    #[test]
    fn test_missing_tier_rejected() {
        assert_eq!(
            MembershipRecord::try_from(raw(r#"{"status": "active"}"#)),
            Err(MembershipError::MissingTier)
        );
        assert_eq!(
            MembershipRecord::try_from(raw(r#"{"tier": "  "}"#)),
            Err(MembershipError::MissingTier)
        );
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        assert!(matches!(
            MembershipRecord::try_from(raw(r#"{"tier": "trial", "trial_end": "next tuesday"}"#)),
            Err(MembershipError::InvalidTimestamp { field: "trial_end", .. })
        ));
    }

    #[test]
    fn test_inverted_window_rejected() {
        assert_eq!(
            MembershipRecord::try_from(raw(
                r#"{"tier": "trial", "trial_start": "2025-02-01T00:00:00Z",
                    "trial_end": "2025-01-01T00:00:00Z"}"#
            )),
            Err(MembershipError::TrialWindowInverted)
        );
    }
}
