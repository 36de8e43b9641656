//! EntitlementCheck - yes/no access queries against the tier hierarchy
//!
//! Unknown tier names never grant access. A misspelled required tier is a
//! programming error: development builds panic on it, production logs and
//! denies.

use tracing::error;

use super::hierarchy::Tier;
use crate::config::{ConfigError, Mode};

/// Strict check: `Err` when either tier name is unknown
pub fn check_access(effective: &str, required: &str) -> Result<bool, ConfigError> {
    let effective: Tier = effective.parse()?;
    let required: Tier = required.parse()?;
    Ok(effective.at_least(required))
}

/// Typed check
pub fn has_tier_access(effective: Tier, required: Tier) -> bool {
    effective.at_least(required)
}

/// Production-mode [`EntitlementCheck::has_access`]
pub fn has_access(effective: Option<&str>, required: Option<&str>) -> bool {
    EntitlementCheck::new(Mode::Production).has_access(effective, required)
}

/// Mode-aware access check over tier names
#[derive(Debug, Clone, Copy, Default)]
pub struct EntitlementCheck {
    mode: Mode,
}

impl EntitlementCheck {
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether `effective` meets `required`.
    ///
    /// # Panics
    ///
    /// In development mode, when `required` is missing or not a known tier.
    pub fn has_access(&self, effective: Option<&str>, required: Option<&str>) -> bool {
        let Some(required) = self.required_tier(required) else {
            return false;
        };

        match effective.and_then(Tier::parse) {
            Some(effective) => effective.at_least(required),
            None => {
                error!(
                    effective = ?effective,
                    required = %required,
                    "Unknown effective tier; denying access"
                );
                false
            }
        }
    }

    fn required_tier(&self, required: Option<&str>) -> Option<Tier> {
        let parsed = required.and_then(Tier::parse);
        if parsed.is_none() {
            let err = ConfigError::UnknownTier(required.unwrap_or_default().to_string());
            if self.mode.is_development() {
                panic!("Entitlement check misconfigured: {err}");
            }
            error!(error = %err, "Entitlement check misconfigured; denying access");
        }
        parsed
    }
}
