//! Hardcoded flag table, the last link of the fallback chain

use super::source::FlagRow;

/// Flags used when neither the remote table nor the local fallback file is reachable
pub fn hardcoded_defaults() -> Vec<FlagRow> {
    vec![
        FlagRow::new("referrals_enabled", false, "Enable referral system"),
        FlagRow::new("token_rewire_mode", false, "Enable design tokens"),
        FlagRow::new("hi_map_animation", true, "Enable map animations"),
        FlagRow::new("premium_ux_effects", true, "Enable glassmorphism effects"),
        FlagRow::new("monitoring_analytics", true, "Enable analytics tracking"),
        FlagRow::new(
            "hibase_shares_enabled",
            false,
            "Enable HiBase shares integration (unified API)",
        ),
        FlagRow::new(
            "hifeed_enabled",
            true,
            "Enable unified feed experience layer (HiFeed + HiStreaks)",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_unique() {
        let rows = hardcoded_defaults();
        let names: HashSet<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.len(), rows.len());
    }
}
