//! Remote backends
//!
//! The Supabase client implements both the flag source and the membership
//! source. [`StaticMembershipSource`] serves fixed rows for tests and offline
//! runs.

pub mod client;

pub use client::{SupabaseClient, SupabaseConfig};

use dashmap::DashMap;

use crate::flags::FlagSourceError;
use crate::tiers::RawMembership;

/// Membership lookup keyed by user id
#[async_trait::async_trait]
pub trait MembershipSource: Send + Sync {
    /// The user's membership row, `None` when there is none
    async fn fetch(&self, user_id: &str) -> Result<Option<RawMembership>, FlagSourceError>;
}

/// In-memory membership rows
#[derive(Default)]
pub struct StaticMembershipSource {
    rows: DashMap<String, RawMembership>,
}

impl StaticMembershipSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: impl Into<String>, row: RawMembership) {
        self.rows.insert(user_id.into(), row);
    }
}

#[async_trait::async_trait]
impl MembershipSource for StaticMembershipSource {
    async fn fetch(&self, user_id: &str) -> Result<Option<RawMembership>, FlagSourceError> {
        Ok(self.rows.get(user_id).map(|row| row.clone()))
    }
}
