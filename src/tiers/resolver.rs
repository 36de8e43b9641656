//! TierResolver - raw membership to effective tier
//!
//! A pure function of `(record, now)`. The only state change is the one-way
//! `trial-active → trial-expired` transition, driven by the clock alone. The
//! trial end is exclusive: at `now == trial_end` the trial has expired.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::hierarchy::Tier;
use super::membership::MembershipRecord;

/// Tier granted while a trial is running
pub const TRIAL_GRANTED_TIER: Tier = Tier::Bronze;

/// Days before the end of a trial at which reminders start
pub const TRIAL_REMINDER_DAYS: i64 = 4;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Map a stored tier name to a tier. `None` for names we do not know.
///
/// Database names (`beta`, `standard`, `premium`, `lifetime`) and the canonical
/// tier names are both accepted. `trial` is resolved by [`effective_tier`].
pub fn map_raw_tier(raw: &str) -> Option<Tier> {
    match raw {
        "beta" => Some(Tier::Bronze),
        "standard" => Some(Tier::Gold),
        "lifetime" => Some(Tier::Collective),
        "trial" | "anonymous" => Some(Tier::Free),
        other => Tier::parse(other),
    }
}

/// Effective tier of a membership at `now`
pub fn effective_tier(record: Option<&MembershipRecord>, now: DateTime<Utc>) -> Tier {
    let Some(record) = record else {
        return Tier::Free;
    };

    if record.is_trial() {
        return match record.trial_end {
            Some(end) if now < end => TRIAL_GRANTED_TIER,
            _ => Tier::Free,
        };
    }

    map_raw_tier(&record.tier).unwrap_or_else(|| {
        warn!(tier = %record.tier, "Unknown membership tier; treating as free");
        Tier::Free
    })
}

/// Trial countdown for reminder banners
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialStatus {
    pub active: bool,
    pub tier: Tier,
    /// Whole days left, rounded up, never negative
    pub days_left: i64,
    pub ends_at: DateTime<Utc>,
    pub should_show_reminder: bool,
    pub show_urgency: bool,
    pub expired: bool,
}

/// Trial status of a `trial` record with an end date; `None` otherwise
pub fn trial_status(record: &MembershipRecord, now: DateTime<Utc>) -> Option<TrialStatus> {
    if !record.is_trial() {
        return None;
    }
    let ends_at = record.trial_end?;

    let remaining_ms = (ends_at - now).num_milliseconds();
    let days_left = if remaining_ms > 0 {
        (remaining_ms + DAY_MS - 1) / DAY_MS
    } else {
        0
    };
    let active = now < ends_at;

    Some(TrialStatus {
        active,
        tier: effective_tier(Some(record), now),
        days_left,
        ends_at,
        should_show_reminder: active && days_left <= TRIAL_REMINDER_DAYS,
        show_urgency: active && days_left <= 1,
        expired: !active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_absent_record_is_free() {
        assert_eq!(effective_tier(None, t0()), Tier::Free);
    }

    #[test]
    fn test_trial_boundary() {
        let end = t0();
        let record = MembershipRecord::trial(None, Some(end));

        assert_eq!(
            effective_tier(Some(&record), end - Duration::seconds(1)),
            Tier::Bronze
        );
        assert_eq!(effective_tier(Some(&record), end), Tier::Free);
        assert_eq!(
            effective_tier(Some(&record), end + Duration::seconds(1)),
            Tier::Free
        );
    }

    #[test]
    fn test_trial_without_end_is_free() {
        let record = MembershipRecord::trial(Some(t0()), None);
        assert_eq!(effective_tier(Some(&record), t0()), Tier::Free);
        assert!(trial_status(&record, t0()).is_none());
    }

    #[test]
    fn test_raw_tier_mapping() {
        let cases = [
            ("beta", Tier::Bronze),
            ("standard", Tier::Gold),
            ("premium", Tier::Premium),
            ("lifetime", Tier::Collective),
            ("silver", Tier::Silver),
            ("collective", Tier::Collective),
            ("anonymous", Tier::Free),
            ("enterprise", Tier::Free),
        ];
        for (raw, expected) in cases {
            let record = MembershipRecord::new(raw);
            assert_eq!(effective_tier(Some(&record), t0()), expected, "raw tier {}", raw);
        }
    }

    #[test]
    fn test_pure_and_non_mutating() {
        let record = MembershipRecord::trial(None, Some(t0() + Duration::days(3)));
        let before = record.clone();

        let a = effective_tier(Some(&record), t0());
        let b = effective_tier(Some(&record), t0());
        assert_eq!(a, b);
        assert_eq!(record, before);
    }

    #[test]
    fn test_trial_status_reminders() {
        let record = MembershipRecord::trial(None, Some(t0() + Duration::days(10)));
        let early = trial_status(&record, t0()).unwrap();
        assert!(early.active);
        assert_eq!(early.days_left, 10);
        assert!(!early.should_show_reminder);

        let late = trial_status(&record, t0() + Duration::days(6) + Duration::hours(1)).unwrap();
        assert_eq!(late.days_left, 4);
        assert!(late.should_show_reminder);
        assert!(!late.show_urgency);

        let last = trial_status(&record, t0() + Duration::days(9) + Duration::hours(20)).unwrap();
        assert_eq!(last.days_left, 1);
        assert!(last.show_urgency);
        assert_eq!(last.tier, Tier::Bronze);

        let over = trial_status(&record, t0() + Duration::days(11)).unwrap();
        assert!(over.expired);
        assert!(!over.active);
        assert_eq!(over.days_left, 0);
        assert_eq!(over.tier, Tier::Free);
        assert!(!over.should_show_reminder);
    }

    #[test]
    fn test_non_trial_has_no_status() {
        assert!(trial_status(&MembershipRecord::new("premium"), t0()).is_none());
    }
}
