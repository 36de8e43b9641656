//! Rollout percentages per flag

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{error, info};

use crate::config::{ConfigError, Mode};

/// Flags under partial rollout out of the box
pub const DEFAULT_ROLLOUT_FLAGS: [&str; 4] = [
    "hifeed_enabled",
    "hibase_shares_enabled",
    "hibase_profile_enabled",
    "hibase_referrals_enabled",
];

/// Starting percentage for the default rollout flags
pub const DEFAULT_ROLLOUT_PERCENT: u8 = 10;

/// A validated percentage in 0..=100
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RolloutPercent(u8);

impl RolloutPercent {
    pub const NONE: RolloutPercent = RolloutPercent(0);
    pub const ALL: RolloutPercent = RolloutPercent(100);

    /// Validate a raw percentage. Out-of-range values are rejected, never clamped.
    pub fn new(flag: &str, percent: i64) -> Result<Self, ConfigError> {
        if (0..=100).contains(&percent) {
            Ok(Self(percent as u8))
        } else {
            Err(ConfigError::PercentOutOfRange {
                flag: flag.to_string(),
                percent,
            })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for RolloutPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// One flag's rollout setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloutConfig {
    pub flag_name: String,
    pub percent: RolloutPercent,
}

/// Bulk rollout phases applied to every tracked flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutPreset {
    Start,
    Mid,
    Full,
    Off,
}

impl RolloutPreset {
    pub fn percent(self) -> RolloutPercent {
        match self {
            RolloutPreset::Start => RolloutPercent(10),
            RolloutPreset::Mid => RolloutPercent(50),
            RolloutPreset::Full => RolloutPercent::ALL,
            RolloutPreset::Off => RolloutPercent::NONE,
        }
    }
}

impl FromStr for RolloutPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(RolloutPreset::Start),
            "mid" => Ok(RolloutPreset::Mid),
            "full" => Ok(RolloutPreset::Full),
            "off" => Ok(RolloutPreset::Off),
            other => Err(ConfigError::InvalidSetting {
                name: "preset",
                reason: format!("unknown preset '{}' (start, mid, full, off)", other),
            }),
        }
    }
}

fn parse_entry(entry: &str) -> Result<(String, i64), ConfigError> {
    let (name, percent) = entry
        .split_once('=')
        .ok_or_else(|| ConfigError::MalformedRollout(entry.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ConfigError::MalformedRollout(entry.to_string()));
    }
    let percent = percent
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::MalformedRollout(entry.to_string()))?;
    Ok((name.to_string(), percent))
}

fn entries_of(spec: &str) -> impl Iterator<Item = &str> {
    spec.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Parse `"name=percent,name=percent"` strictly
pub fn parse_rollout_spec(spec: &str) -> Result<Vec<RolloutConfig>, ConfigError> {
    entries_of(spec)
        .map(|entry| {
            let (flag_name, raw) = parse_entry(entry)?;
            let percent = RolloutPercent::new(&flag_name, raw)?;
            Ok(RolloutConfig { flag_name, percent })
        })
        .collect()
}

/// Rollout percentages keyed by flag name.
///
/// Like the flag store, the table is replaced as a whole on every change.
pub struct RolloutTable {
    mode: Mode,
    entries: RwLock<Arc<HashMap<String, RolloutPercent>>>,
}

impl RolloutTable {
    /// Empty table: every flag defers to the flag store
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            entries: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Table seeded with the default rollout flags
    pub fn with_defaults(mode: Mode) -> Self {
        let entries = DEFAULT_ROLLOUT_FLAGS
            .iter()
            .map(|flag| (flag.to_string(), RolloutPercent(DEFAULT_ROLLOUT_PERCENT)))
            .collect();
        Self {
            mode,
            entries: RwLock::new(Arc::new(entries)),
        }
    }

    fn current(&self) -> Arc<HashMap<String, RolloutPercent>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut HashMap<String, RolloutPercent>)) {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = HashMap::clone(&guard);
        f(&mut next);
        *guard = Arc::new(next);
    }

    pub fn get(&self, flag: &str) -> Option<RolloutPercent> {
        self.current().get(flag).copied()
    }

    /// Set one flag's percentage. Out-of-range input leaves the table unchanged.
    pub fn set(&self, flag: &str, percent: i64) -> Result<RolloutPercent, ConfigError> {
        let percent = RolloutPercent::new(flag, percent).inspect_err(|e| {
            error!(flag = %flag, error = %e, "Rejected rollout update");
        })?;
        self.update(|entries| {
            entries.insert(flag.to_string(), percent);
        });
        info!(flag = %flag, percent = percent.get(), "Rollout updated");
        Ok(percent)
    }

    /// Take a flag out of partial rollout
    pub fn remove(&self, flag: &str) -> Option<RolloutPercent> {
        let previous = self.get(flag);
        self.update(|entries| {
            entries.remove(flag);
        });
        previous
    }

    /// Set every tracked flag to the preset percentage
    pub fn apply_preset(&self, preset: RolloutPreset) {
        let percent = preset.percent();
        self.update(|entries| {
            for value in entries.values_mut() {
                *value = percent;
            }
        });
        info!(preset = ?preset, percent = percent.get(), "Rollout preset applied");
    }

    /// Apply a `name=percent,...` spec on top of the current table.
    ///
    /// Development mode rejects the whole spec on the first bad entry. Production
    /// mode skips malformed entries and pins out-of-range flags at 0%.
    pub fn load_spec(&self, spec: &str) -> Result<usize, ConfigError> {
        let parsed = if self.mode.is_development() {
            parse_rollout_spec(spec)?
        } else {
            let mut parsed = Vec::new();
            for entry in entries_of(spec) {
                match parse_entry(entry) {
                    Ok((flag_name, raw)) => {
                        let percent = RolloutPercent::new(&flag_name, raw).unwrap_or_else(|e| {
                            error!(error = %e, "Invalid rollout percent; pinning flag at 0%");
                            RolloutPercent::NONE
                        });
                        parsed.push(RolloutConfig { flag_name, percent });
                    }
                    Err(e) => error!(error = %e, "Skipping malformed rollout entry"),
                }
            }
            parsed
        };

        let count = parsed.len();
        self.update(|entries| {
            for config in parsed {
                entries.insert(config.flag_name, config.percent);
            }
        });
        Ok(count)
    }

    /// All entries sorted by flag name
    pub fn entries(&self) -> Vec<RolloutConfig> {
        let mut entries: Vec<_> = self
            .current()
            .iter()
            .map(|(flag_name, percent)| RolloutConfig {
                flag_name: flag_name.clone(),
                percent: *percent,
            })
            .collect();
        entries.sort_by(|a, b| a.flag_name.cmp(&b.flag_name));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_bounds() {
        assert_eq!(RolloutPercent::new("f", 0).unwrap(), RolloutPercent::NONE);
        assert_eq!(RolloutPercent::new("f", 100).unwrap(), RolloutPercent::ALL);
        assert_eq!(
            RolloutPercent::new("f", 101),
            Err(ConfigError::PercentOutOfRange {
                flag: "f".to_string(),
                percent: 101
            })
        );
        assert!(RolloutPercent::new("f", -1).is_err());
    }

    #[test]
    fn test_defaults() {
        let table = RolloutTable::with_defaults(Mode::Production);
        for flag in DEFAULT_ROLLOUT_FLAGS {
            assert_eq!(table.get(flag).map(RolloutPercent::get), Some(10));
        }
        assert_eq!(table.get("referrals_enabled"), None);
    }

    #[test]
    fn test_set_rejects_out_of_range_without_change() {
        let table = RolloutTable::with_defaults(Mode::Production);
        assert!(table.set("hifeed_enabled", 250).is_err());
        assert_eq!(table.get("hifeed_enabled").map(RolloutPercent::get), Some(10));

        table.set("hifeed_enabled", 25).unwrap();
        assert_eq!(table.get("hifeed_enabled").map(RolloutPercent::get), Some(25));
    }

    #[test]
    fn test_presets() {
        let table = RolloutTable::with_defaults(Mode::Production);
        table.apply_preset(RolloutPreset::Mid);
        assert!(table.entries().iter().all(|e| e.percent.get() == 50));
        table.apply_preset(RolloutPreset::Off);
        assert!(table.entries().iter().all(|e| e.percent == RolloutPercent::NONE));
        assert_eq!("full".parse::<RolloutPreset>().unwrap(), RolloutPreset::Full);
        assert!("sideways".parse::<RolloutPreset>().is_err());
    }

    #[test]
    fn test_parse_spec() {
        let parsed = parse_rollout_spec(" hifeed_enabled=25 , beta_map=0,").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].flag_name, "hifeed_enabled");
        assert_eq!(parsed[0].percent.get(), 25);

        assert!(matches!(
            parse_rollout_spec("hifeed_enabled"),
            Err(ConfigError::MalformedRollout(_))
        ));
        assert!(matches!(
            parse_rollout_spec("=5"),
            Err(ConfigError::MalformedRollout(_))
        ));
    }

    #[test]
    fn test_load_spec_dev_is_all_or_nothing() {
        let table = RolloutTable::new(Mode::Development);
        assert!(table.load_spec("a=20,b=120").is_err());
        assert!(table.entries().is_empty());
    }

    #[test]
    fn test_load_spec_prod_fails_closed() {
        let table = RolloutTable::new(Mode::Production);
        let applied = table.load_spec("a=20,b=120,garbage").unwrap();
        assert_eq!(applied, 2);
        assert_eq!(table.get("a").map(RolloutPercent::get), Some(20));
        assert_eq!(table.get("b"), Some(RolloutPercent::NONE));
    }

    #[test]
    fn test_remove() {
        let table = RolloutTable::with_defaults(Mode::Production);
        assert!(table.remove("hifeed_enabled").is_some());
        assert_eq!(table.get("hifeed_enabled"), None);
    }
}
