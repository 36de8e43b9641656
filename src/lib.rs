//! hi-gate - feature flag rollout and tier entitlements for Stay Hi
//!
//! Decides two things for the UI layer:
//!
//! - **Flags**: is feature X on for identity Y? Flags load wholesale from the
//!   Supabase `hi_flags` table, a local JSON fallback, or hardcoded defaults,
//!   and flags under partial rollout are bucketed by a stable identity hash.
//! - **Entitlements**: given a membership record, which tier does the user
//!   actually hold right now, and does it meet a required tier?
//!
//! Everything hangs off an explicit [`HiContext`] built once at startup.

pub mod config;
pub mod context;
pub mod flags;
pub mod identity;
pub mod remote;
pub mod rollout;
pub mod tiers;
pub mod types;

pub use config::{Args, Mode};
pub use context::HiContext;
pub use types::{HiGateError, Result};
