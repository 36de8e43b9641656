//! Tier hierarchy
//!
//! Total order over membership tiers; a higher tier gets everything a lower
//! tier gets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// Entitlement tiers, lowest first
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Tier {
    /// Signed-out, expired trial, or unknown membership
    #[default]
    Free = 1,
    Bronze = 2,
    Silver = 3,
    Gold = 4,
    Premium = 5,
    /// Admin and community leadership
    Collective = 6,
}

impl Tier {
    pub const ALL: [Tier; 6] = [
        Tier::Free,
        Tier::Bronze,
        Tier::Silver,
        Tier::Gold,
        Tier::Premium,
        Tier::Collective,
    ];

    /// Position in the hierarchy, 1-6
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Premium => "premium",
            Tier::Collective => "collective",
        }
    }

    /// Case-insensitive lookup of a canonical tier name
    pub fn parse(name: &str) -> Option<Tier> {
        let name = name.trim();
        Tier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(name))
    }

    /// True if this tier meets `required`
    pub fn at_least(self, required: Tier) -> bool {
        self >= required
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::parse(s).ok_or_else(|| ConfigError::UnknownTier(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Tier::Collective > Tier::Premium);
        assert!(Tier::Premium > Tier::Gold);
        assert!(Tier::Gold > Tier::Silver);
        assert!(Tier::Silver > Tier::Bronze);
        assert!(Tier::Bronze > Tier::Free);
        assert!(Tier::ALL.windows(2).all(|w| w[0].rank() + 1 == w[1].rank()));
    }

    #[test]
    fn test_parse() {
        assert_eq!(Tier::parse("GOLD"), Some(Tier::Gold));
        assert_eq!(Tier::parse(" collective "), Some(Tier::Collective));
        assert_eq!(Tier::parse("platinum"), None);
        assert_eq!(
            "platinum".parse::<Tier>(),
            Err(ConfigError::UnknownTier("platinum".to_string()))
        );
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Tier::Bronze).unwrap(), "\"bronze\"");
        let tier: Tier = serde_json::from_str("\"premium\"").unwrap();
        assert_eq!(tier, Tier::Premium);
    }
}
