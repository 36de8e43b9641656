//! Cohort rollout
//!
//! Flags listed in the rollout table are enabled for a deterministic share of
//! identities; everything else defers to the flag store.

pub mod gate;
pub mod hash;
pub mod table;

pub use gate::{CohortSample, DecisionReason, RolloutDecision, RolloutGate};
pub use hash::{bucket, stable_hash};
pub use table::{
    parse_rollout_spec, RolloutConfig, RolloutPercent, RolloutPreset, RolloutTable,
    DEFAULT_ROLLOUT_FLAGS, DEFAULT_ROLLOUT_PERCENT,
};
