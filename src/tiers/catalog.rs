//! Tier catalog: branding, pricing and feature tables per tier
//!
//! Higher tiers carry every capability of the tiers below them plus more.

use serde::Serialize;

use super::hierarchy::Tier;

/// Capability that allows toggling feature flags
pub const FEATURE_FLAGS_CAPABILITY: &str = "featureFlags";

/// Value of one feature entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Enabled(bool),
    /// Monthly allowance
    Quota(u32),
    /// Named access level such as "basic", "full" or "unlimited"
    Level(&'static str),
}

impl FeatureValue {
    /// Whether the value grants any access at all
    pub fn grants_access(self) -> bool {
        match self {
            FeatureValue::Enabled(enabled) => enabled,
            FeatureValue::Quota(n) => n > 0,
            FeatureValue::Level(level) => !matches!(level, "none" | "hidden" | "view_only"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TierProfile {
    pub tier: Tier,
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub trial_days: u32,
    pub price_cents: u32,
    pub upgrade_prompt: &'static str,
    pub cta_text: Option<&'static str>,
    pub features: &'static [(&'static str, FeatureValue)],
}

impl TierProfile {
    pub fn feature(&self, name: &str) -> Option<FeatureValue> {
        self.features
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }
}

use FeatureValue::{Enabled, Level, Quota};

const UNLIMITED: FeatureValue = Level("unlimited");

static FREE: TierProfile = TierProfile {
    tier: Tier::Free,
    name: "Free Explorer",
    display_name: "Hi Explorer",
    description: "Start your journey with 5 private shares per month",
    trial_days: 90,
    price_cents: 0,
    upgrade_prompt: "Upgrade to Bronze for 30 shares/month and public sharing!",
    cta_text: Some("Upgrade to Bronze"),
    features: &[
        ("hiMedallionInteractions", UNLIMITED),
        ("mapAccess", Level("full")),
        ("shareCreation", Quota(5)),
        ("shareViewing", Level("all")),
        ("profileAccess", Level("basic")),
        ("avatarUpload", Enabled(false)),
        ("usernameChange", Enabled(true)),
        ("hiMuscleAccess", Enabled(true)),
        ("calendarAccess", Enabled(true)),
        ("trendsAccess", Enabled(false)),
        ("archiveAccess", Level("basic")),
        ("communityStats", Level("basic")),
        ("leaderboard", Level("visible")),
    ],
};

static BRONZE: TierProfile = TierProfile {
    tier: Tier::Bronze,
    name: "Bronze Member",
    display_name: "Hi Pathfinder",
    description: "Share daily with the Hi community",
    trial_days: 90,
    price_cents: 555,
    upgrade_prompt: "Upgrade to Silver for 75 shares/month!",
    cta_text: Some("Upgrade to Silver"),
    features: &[
        ("hiMedallionInteractions", UNLIMITED),
        ("mapAccess", Level("full")),
        ("shareCreation", Quota(30)),
        ("shareViewing", Level("all")),
        ("publicShares", Enabled(true)),
        ("profileAccess", Level("full")),
        ("avatarUpload", Enabled(true)),
        ("usernameChange", UNLIMITED),
        ("hiMuscleAccess", Enabled(true)),
        ("calendarAccess", Enabled(true)),
        ("trendsAccess", Enabled(false)),
        ("archiveAccess", Level("full")),
        ("communityStats", Level("full")),
        ("leaderboard", Level("visible")),
    ],
};

static SILVER: TierProfile = TierProfile {
    tier: Tier::Silver,
    name: "Silver Member",
    display_name: "Hi Trailblazer",
    description: "Share multiple times daily",
    trial_days: 90,
    price_cents: 1555,
    upgrade_prompt: "Upgrade to Gold for 150 shares/month!",
    cta_text: Some("Upgrade to Gold"),
    features: &[
        ("hiMedallionInteractions", UNLIMITED),
        ("mapAccess", Level("full")),
        ("shareCreation", Quota(75)),
        ("shareViewing", Level("all")),
        ("publicShares", Enabled(true)),
        ("profileAccess", Level("full")),
        ("avatarUpload", Enabled(true)),
        ("usernameChange", UNLIMITED),
        ("customThemes", Enabled(true)),
        ("hiMuscleAccess", Level("full")),
        ("calendarAccess", Enabled(true)),
        ("trendsAccess", Level("basic")),
        ("archiveAccess", Level("full")),
        ("communityStats", Level("full")),
        ("leaderboard", Level("visible_with_rank")),
    ],
};

static GOLD: TierProfile = TierProfile {
    tier: Tier::Gold,
    name: "Gold Member",
    display_name: "Hi Champion",
    description: "Share multiple times daily",
    trial_days: 90,
    price_cents: 2555,
    upgrade_prompt: "Upgrade to Premium for unlimited shares!",
    cta_text: Some("Upgrade to Premium"),
    features: &[
        ("hiMedallionInteractions", UNLIMITED),
        ("mapAccess", Level("full")),
        ("mapFilters", Enabled(true)),
        ("shareCreation", Quota(150)),
        ("shareViewing", Level("all")),
        ("publicShares", Enabled(true)),
        ("shareAnalytics", Level("basic")),
        ("profileAccess", Level("full")),
        ("avatarUpload", Enabled(true)),
        ("usernameChange", UNLIMITED),
        ("customThemes", Enabled(true)),
        ("profileBadges", Enabled(true)),
        ("hiMuscleAccess", Enabled(true)),
        ("calendarAccess", Enabled(true)),
        ("trendsAccess", Level("full")),
        ("archiveAccess", UNLIMITED),
        ("exportData", Enabled(true)),
        ("communityStats", Level("full")),
        ("leaderboard", Level("visible_with_rank")),
        ("directMessages", Level("basic")),
    ],
};

static PREMIUM: TierProfile = TierProfile {
    tier: Tier::Premium,
    name: "Premium Member",
    display_name: "Hi Pioneer",
    description: "Unlimited sharing and all features",
    trial_days: 90,
    price_cents: 5555,
    upgrade_prompt: "Join the Collective for admin tools and community leadership!",
    cta_text: Some("Join Collective"),
    features: &[
        ("hiMedallionInteractions", UNLIMITED),
        ("tapInsights", Enabled(true)),
        ("mapAccess", Level("full")),
        ("mapFilters", Enabled(true)),
        ("mapHeatmap", Enabled(true)),
        ("shareCreation", UNLIMITED),
        ("shareViewing", Level("all")),
        ("publicShares", Enabled(true)),
        ("shareAnalytics", Level("full")),
        ("shareScheduling", UNLIMITED),
        ("profileAccess", Level("full")),
        ("avatarUpload", Enabled(true)),
        ("usernameChange", UNLIMITED),
        ("customThemes", Enabled(true)),
        ("profileBadges", Enabled(true)),
        ("customBadges", Enabled(true)),
        ("verifiedBadge", Enabled(true)),
        ("hiMuscleAccess", UNLIMITED),
        ("calendarAccess", Enabled(true)),
        ("trendsAccess", Level("premium")),
        ("archiveAccess", UNLIMITED),
        ("exportData", Enabled(true)),
        ("apiAccess", Level("basic")),
        ("communityStats", Level("full")),
        ("leaderboard", Level("visible_with_rank")),
        ("directMessages", UNLIMITED),
        ("prioritySupport", Enabled(true)),
        ("betaFeatures", Enabled(true)),
    ],
};

static COLLECTIVE: TierProfile = TierProfile {
    tier: Tier::Collective,
    name: "Collective Member",
    display_name: "Hi Collective",
    description: "Full admin access and community leadership",
    trial_days: 90,
    price_cents: 15555,
    upgrade_prompt: "You have full access to Hi!",
    cta_text: None,
    features: &[
        ("hiMedallionInteractions", UNLIMITED),
        ("tapInsights", Enabled(true)),
        ("mapAccess", Level("full")),
        ("mapFilters", Enabled(true)),
        ("mapHeatmap", Enabled(true)),
        ("shareCreation", UNLIMITED),
        ("shareViewing", Level("all")),
        ("publicShares", Enabled(true)),
        ("shareAnalytics", Level("full")),
        ("shareScheduling", UNLIMITED),
        ("profileAccess", Level("full")),
        ("avatarUpload", Enabled(true)),
        ("usernameChange", UNLIMITED),
        ("customThemes", Enabled(true)),
        ("profileBadges", Enabled(true)),
        ("customBadges", Enabled(true)),
        ("verifiedBadge", Enabled(true)),
        ("hiMuscleAccess", UNLIMITED),
        ("calendarAccess", Enabled(true)),
        ("trendsAccess", Level("premium")),
        ("archiveAccess", UNLIMITED),
        ("exportData", Enabled(true)),
        ("apiAccess", Level("full")),
        ("communityStats", Level("full")),
        ("leaderboard", Level("visible_with_rank")),
        ("directMessages", UNLIMITED),
        ("prioritySupport", Enabled(true)),
        ("betaFeatures", Enabled(true)),
        ("adminPanel", Enabled(true)),
        ("userManagement", Level("full")),
        ("inviteCodeGeneration", UNLIMITED),
        ("analyticsAccess", Level("full")),
        ("contentModeration", Enabled(true)),
        (FEATURE_FLAGS_CAPABILITY, Enabled(true)),
        ("systemMonitoring", Enabled(true)),
        ("databaseAccess", Level("read_only")),
        ("communityEvents", Level("create")),
        ("announcementPosts", Enabled(true)),
    ],
};

impl Tier {
    /// Catalog entry for this tier
    pub fn profile(self) -> &'static TierProfile {
        match self {
            Tier::Free => &FREE,
            Tier::Bronze => &BRONZE,
            Tier::Silver => &SILVER,
            Tier::Gold => &GOLD,
            Tier::Premium => &PREMIUM,
            Tier::Collective => &COLLECTIVE,
        }
    }
}

/// Whether `tier` can use `feature`. Unknown features are denied.
pub fn can_access_feature(tier: Tier, feature: &str) -> bool {
    tier.profile()
        .feature(feature)
        .is_some_and(FeatureValue::grants_access)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_match_tiers() {
        for tier in Tier::ALL {
            assert_eq!(tier.profile().tier, tier);
        }
        assert_eq!(Tier::Collective.profile().cta_text, None);
    }

    #[test]
    fn test_prices_increase_with_rank() {
        assert!(Tier::ALL
            .windows(2)
            .all(|w| w[0].profile().price_cents < w[1].profile().price_cents));
    }

    #[test]
    fn test_feature_value_semantics() {
        assert!(Enabled(true).grants_access());
        assert!(!Enabled(false).grants_access());
        assert!(Quota(5).grants_access());
        assert!(!Quota(0).grants_access());
        assert!(UNLIMITED.grants_access());
        assert!(Level("basic").grants_access());
        assert!(!Level("none").grants_access());
        assert!(!Level("hidden").grants_access());
        assert!(!Level("view_only").grants_access());
    }

    #[test]
    fn test_can_access_feature() {
        assert!(!can_access_feature(Tier::Free, "avatarUpload"));
        assert!(can_access_feature(Tier::Bronze, "avatarUpload"));
        assert!(can_access_feature(Tier::Free, "shareCreation"));
        assert!(!can_access_feature(Tier::Gold, "adminPanel"));
        assert!(can_access_feature(Tier::Collective, FEATURE_FLAGS_CAPABILITY));
        assert!(!can_access_feature(Tier::Premium, FEATURE_FLAGS_CAPABILITY));
        assert!(!can_access_feature(Tier::Collective, "teleportation"));
    }
}
