//! Membership tiers and entitlements
//!
//! - **Hierarchy**: total order over the six tiers
//! - **Membership**: validated backend records
//! - **Resolver**: effective tier at a point in time, trial countdown
//! - **Catalog**: per-tier branding, pricing and feature tables
//! - **Entitlement**: required-tier checks

pub mod catalog;
pub mod entitlement;
pub mod hierarchy;
pub mod membership;
pub mod resolver;

pub use catalog::{can_access_feature, FeatureValue, TierProfile, FEATURE_FLAGS_CAPABILITY};
pub use entitlement::{check_access, has_access, has_tier_access, EntitlementCheck};
pub use hierarchy::Tier;
pub use membership::{MembershipError, MembershipRecord, RawMembership};
pub use resolver::{
    effective_tier, map_raw_tier, trial_status, TrialStatus, TRIAL_GRANTED_TIER,
    TRIAL_REMINDER_DAYS,
};
