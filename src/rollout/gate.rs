//! RolloutGate - cohort membership decisions

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::hash::bucket;
use super::table::{RolloutPercent, RolloutTable};
use crate::flags::FlagStore;

/// Why a flag resolved the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DecisionReason {
    /// Not under partial rollout; the flag store decided
    FlagStore,
    /// Rollout at 0%
    RolloutOff,
    /// Rollout at 100%
    RolloutFull,
    /// Identity hashed into a bucket and compared against the percentage
    Bucket { bucket: u8, percent: u8 },
    /// Empty identity, denied
    EmptyIdentity,
}

/// Outcome of a cohort check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RolloutDecision {
    pub enabled: bool,
    pub reason: DecisionReason,
}

/// Result of sampling many identities against one flag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortSample {
    pub enabled: usize,
    pub samples: usize,
    /// Share of enabled samples, 0-100
    pub percentage: f64,
    /// Configured percentage, if the flag is under rollout
    pub expected: Option<u8>,
}

/// Decides whether a flag is on for a given identity
#[derive(Clone)]
pub struct RolloutGate {
    flags: FlagStore,
    table: Arc<RolloutTable>,
}

impl RolloutGate {
    pub fn new(flags: FlagStore, table: Arc<RolloutTable>) -> Self {
        Self { flags, table }
    }

    pub fn table(&self) -> &Arc<RolloutTable> {
        &self.table
    }

    pub fn flags(&self) -> &FlagStore {
        &self.flags
    }

    /// Full decision with its reason
    pub fn decide(&self, identity: &str, flag: &str) -> RolloutDecision {
        let Some(percent) = self.table.get(flag) else {
            return RolloutDecision {
                enabled: self.flags.get(flag, false),
                reason: DecisionReason::FlagStore,
            };
        };

        if percent == RolloutPercent::NONE {
            return RolloutDecision {
                enabled: false,
                reason: DecisionReason::RolloutOff,
            };
        }
        if percent == RolloutPercent::ALL {
            return RolloutDecision {
                enabled: true,
                reason: DecisionReason::RolloutFull,
            };
        }

        if identity.is_empty() {
            warn!(flag = %flag, "Empty identity for cohort check; denying");
            return RolloutDecision {
                enabled: false,
                reason: DecisionReason::EmptyIdentity,
            };
        }

        let bucket = bucket(identity, flag);
        let enabled = bucket < percent.get();
        debug!(flag = %flag, bucket, percent = percent.get(), enabled, "Cohort decision");
        RolloutDecision {
            enabled,
            reason: DecisionReason::Bucket {
                bucket,
                percent: percent.get(),
            },
        }
    }

    pub fn is_enabled_for(&self, identity: &str, flag: &str) -> bool {
        self.decide(identity, flag).enabled
    }

    /// Check how a flag splits across a set of identities
    pub fn sample_distribution<I, S>(&self, flag: &str, identities: I) -> CohortSample
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut enabled = 0;
        let mut samples = 0;
        for identity in identities {
            samples += 1;
            if self.is_enabled_for(identity.as_ref(), flag) {
                enabled += 1;
            }
        }

        let percentage = if samples == 0 {
            0.0
        } else {
            enabled as f64 * 100.0 / samples as f64
        };

        CohortSample {
            enabled,
            samples,
            percentage,
            expected: self.table.get(flag).map(RolloutPercent::get),
        }
    }
}
