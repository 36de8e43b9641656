//! HiContext - the entry points the UI layer calls
//!
//! Built once at startup and passed to whatever needs it. Holds the flag store,
//! the rollout table, the identity resolver and the optional membership source.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Args, Mode};
use crate::flags::{FileFlagSource, Flag, FlagOrigin, FlagRow, FlagSource, FlagStore, FlagStoreConfig};
use crate::identity::{AuthEvents, FileStore, IdentityResolver, KeyValueStore};
use crate::remote::{MembershipSource, SupabaseClient, SupabaseConfig};
use crate::rollout::{RolloutGate, RolloutTable};
use crate::tiers::{
    can_access_feature, effective_tier, EntitlementCheck, MembershipRecord, Tier,
    FEATURE_FLAGS_CAPABILITY,
};
use crate::types::{HiGateError, Result};

pub struct HiContext {
    mode: Mode,
    gate: RolloutGate,
    identity: IdentityResolver,
    memberships: Option<Arc<dyn MembershipSource>>,
}

impl HiContext {
    pub fn new(
        mode: Mode,
        flags: FlagStore,
        rollout: Arc<RolloutTable>,
        identity: IdentityResolver,
        memberships: Option<Arc<dyn MembershipSource>>,
    ) -> Self {
        Self {
            mode,
            gate: RolloutGate::new(flags, rollout),
            identity,
            memberships,
        }
    }

    /// Wire everything up from configuration. Returns the context and the
    /// publisher side of the auth channel.
    pub fn from_args(args: &Args) -> Result<(Self, AuthEvents)> {
        let mode = args.mode();

        let supabase = SupabaseConfig::from_args(&args.supabase, args.flag_fetch_timeout())
            .map(|config| Arc::new(SupabaseClient::new(config)));
        if supabase.is_none() {
            info!("Supabase not configured; flags load from fallback or defaults");
        }

        let remote = supabase.clone().map(|c| c as Arc<dyn FlagSource>);
        let fallback = args
            .flags_fallback_path
            .as_ref()
            .map(|path| Arc::new(FileFlagSource::new(path.clone())) as Arc<dyn FlagSource>);
        let flags = FlagStore::new(
            FlagStoreConfig {
                fetch_timeout: args.flag_fetch_timeout(),
            },
            remote,
            fallback,
        );

        let rollout = Arc::new(RolloutTable::with_defaults(mode));
        if let Some(spec) = &args.rollout {
            let count = rollout.load_spec(spec)?;
            info!(count, "Rollout overrides applied");
        }

        let storage: Option<Arc<dyn KeyValueStore>> = match &args.identity_store_path {
            Some(path) => match FileStore::open(path) {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Identity store unavailable");
                    None
                }
            },
            None => {
                warn!("IDENTITY_STORE_PATH not set; anonymous visitors share the placeholder identity");
                None
            }
        };

        let auth = AuthEvents::new();
        let identity = IdentityResolver::new(auth.subscribe(), storage);
        let memberships = supabase.map(|c| c as Arc<dyn MembershipSource>);

        Ok((Self::new(mode, flags, rollout, identity, memberships), auth))
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn flags(&self) -> &FlagStore {
        self.gate.flags()
    }

    pub fn rollout(&self) -> &Arc<RolloutTable> {
        self.gate.table()
    }

    pub fn gate(&self) -> &RolloutGate {
        &self.gate
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    /// Is `flag` on for `identity` (or the current identity when `None`)?
    /// Loads the flag table first if nothing is loaded yet.
    pub async fn is_enabled_for_identity(&self, flag: &str, identity: Option<&str>) -> bool {
        if !self.flags().is_loaded() {
            self.flags().load().await;
        }

        match identity {
            Some(identity) => self.gate.is_enabled_for(identity, flag),
            None => self
                .gate
                .is_enabled_for(self.identity.resolve().as_str(), flag),
        }
    }

    /// Does the membership meet `required` right now?
    pub fn has_access(&self, record: Option<&MembershipRecord>, required: &str) -> bool {
        self.has_access_at(record, required, Utc::now())
    }

    pub fn has_access_at(
        &self,
        record: Option<&MembershipRecord>,
        required: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let tier = effective_tier(record, now);
        EntitlementCheck::new(self.mode).has_access(Some(tier.as_str()), Some(required))
    }

    pub async fn refresh(&self) -> FlagOrigin {
        self.flags().refresh().await
    }

    pub fn all_flags(&self) -> BTreeMap<String, Flag> {
        self.flags().all_flags()
    }

    /// Membership for `user_id`. Lookup failures and invalid rows resolve to
    /// `None`, which the tier resolver treats as free.
    pub async fn membership_for(&self, user_id: &str) -> Option<MembershipRecord> {
        let source = self.memberships.as_ref()?;

        let raw = match source.fetch(user_id).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Membership lookup failed; treating as free");
                return None;
            }
        };

        MembershipRecord::try_from(raw)
            .inspect_err(|e| {
                warn!(user_id = %user_id, error = %e, "Invalid membership row; treating as free");
            })
            .ok()
    }

    /// Membership of the signed-in user, if any
    pub async fn current_membership(&self) -> Option<MembershipRecord> {
        let user_id = self.identity.user_id()?;
        self.membership_for(&user_id).await
    }

    /// Change a flag on behalf of `actor`, who needs the feature-flag capability
    pub async fn set_flag(&self, actor: Option<&MembershipRecord>, row: FlagRow) -> Result<Flag> {
        let tier = effective_tier(actor, Utc::now());
        if !can_access_feature(tier, FEATURE_FLAGS_CAPABILITY) {
            warn!(flag = %row.name, tier = %tier, "Flag change denied");
            return Err(HiGateError::Forbidden(format!(
                "tier '{}' cannot change feature flags (requires {})",
                tier,
                Tier::Collective
            )));
        }

        Ok(self.flags().set_flag(row).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::StaticFlagSource;
    use crate::identity::{IdentityKind, MemoryStore};
    use crate::remote::StaticMembershipSource;
    use crate::tiers::RawMembership;
    use chrono::{Duration, TimeZone};

    fn context(rows: Vec<FlagRow>) -> (HiContext, AuthEvents, Arc<StaticMembershipSource>) {
        let flags = FlagStore::new(
            FlagStoreConfig::default(),
            Some(Arc::new(StaticFlagSource::new(rows))),
            None,
        );
        let auth = AuthEvents::new();
        let identity = IdentityResolver::new(auth.subscribe(), Some(Arc::new(MemoryStore::new())));
        let memberships = Arc::new(StaticMembershipSource::new());
        let ctx = HiContext::new(
            Mode::Production,
            flags,
            Arc::new(RolloutTable::new(Mode::Production)),
            identity,
            Some(memberships.clone() as Arc<dyn MembershipSource>),
        );
        (ctx, auth, memberships)
    }

    #[tokio::test]
    async fn test_first_check_loads_flags() {
        let (ctx, _auth, _) = context(vec![FlagRow::new("hifeed_enabled", true, "")]);
        assert!(!ctx.flags().is_loaded());
        assert!(ctx.is_enabled_for_identity("hifeed_enabled", None).await);
        assert_eq!(ctx.flags().origin(), Some(FlagOrigin::Remote));
        assert_eq!(ctx.flags().load_count(), 1);

        ctx.is_enabled_for_identity("hifeed_enabled", None).await;
        assert_eq!(ctx.flags().load_count(), 1);
    }

    #[tokio::test]
    async fn test_rollout_uses_given_identity() {
        let (ctx, _auth, _) = context(vec![FlagRow::new("hifeed_enabled", false, "")]);
        ctx.rollout().set("hifeed_enabled", 18).unwrap();
        assert!(ctx.is_enabled_for_identity("hifeed_enabled", Some("user_81")).await);
        ctx.rollout().set("hifeed_enabled", 17).unwrap();
        assert!(!ctx.is_enabled_for_identity("hifeed_enabled", Some("user_81")).await);
    }

    #[tokio::test]
    async fn test_rollout_follows_signed_in_user() {
        let (ctx, auth, _) = context(vec![]);
        ctx.rollout().set("hifeed_enabled", 18).unwrap();
        auth.sign_in("user_81");
        assert!(ctx.is_enabled_for_identity("hifeed_enabled", None).await);
    }

    #[test]
    fn test_has_access_with_trial() {
        let (ctx, _auth, _) = context(vec![]);
        let end = Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap();
        let record = MembershipRecord::trial(None, Some(end));

        assert!(ctx.has_access_at(Some(&record), "bronze", end - Duration::seconds(1)));
        assert!(!ctx.has_access_at(Some(&record), "bronze", end));
        assert!(!ctx.has_access(None, "gold"));
        assert!(!ctx.has_access(Some(&MembershipRecord::new("premium")), "unknown-tier"));
        assert!(ctx.has_access(Some(&MembershipRecord::new("lifetime")), "premium"));
    }

    #[tokio::test]
    async fn test_membership_lookup_fails_closed() {
        let (ctx, _auth, memberships) = context(vec![]);
        memberships.insert(
            "good",
            RawMembership {
                tier: Some("standard".to_string()),
                ..Default::default()
            },
        );
        memberships.insert(
            "bad",
            RawMembership {
                tier: Some("trial".to_string()),
                trial_end: Some("not a date".to_string()),
                ..Default::default()
            },
        );

        let good = ctx.membership_for("good").await.unwrap();
        assert_eq!(effective_tier(Some(&good), Utc::now()), Tier::Gold);
        assert!(ctx.membership_for("bad").await.is_none());
        assert!(ctx.membership_for("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_set_flag_requires_capability() {
        let (ctx, _auth, _) = context(vec![FlagRow::new("hifeed_enabled", false, "")]);
        ctx.refresh().await;

        let denied = ctx
            .set_flag(
                Some(&MembershipRecord::new("premium")),
                FlagRow::new("hifeed_enabled", true, ""),
            )
            .await;
        assert!(matches!(denied, Err(HiGateError::Forbidden(_))));
        assert!(!ctx.flags().is_enabled("hifeed_enabled"));

        let flag = ctx
            .set_flag(
                Some(&MembershipRecord::new("collective")),
                FlagRow::new("hifeed_enabled", true, ""),
            )
            .await
            .unwrap();
        assert!(flag.enabled);
        assert!(ctx.flags().is_enabled("hifeed_enabled"));
        assert!(ctx.all_flags()["hifeed_enabled"].enabled);
    }

    fn args(extra: &[&str]) -> Args {
        use clap::Parser;
        let mut argv = vec!["hi-gate"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_identity_without_store_is_placeholder_every_run() {
        let args = args(&[]);
        let (first, _) = HiContext::from_args(&args).unwrap();
        let (second, _) = HiContext::from_args(&args).unwrap();

        let a = first.identity().resolve();
        let b = second.identity().resolve();
        assert_eq!(a.kind, IdentityKind::Placeholder);
        assert_eq!(a, b);
    }

    #[test]
    fn test_identity_store_path_keeps_anonymous_id_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        let args = args(&["--identity-store-path", path.to_str().unwrap()]);

        let (first, _) = HiContext::from_args(&args).unwrap();
        let a = first.identity().resolve();
        drop(first);
        let (second, _) = HiContext::from_args(&args).unwrap();
        let b = second.identity().resolve();

        assert_eq!(a.kind, IdentityKind::Anonymous);
        assert_eq!(a, b);
    }
}
