//! Configuration for hi-gate
//!
//! CLI arguments and environment variable handling using clap. A `.env` file
//! is honoured by the binary before parsing.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::rollout::parse_rollout_spec;

/// Configuration errors.
///
/// These are programming or deployment mistakes, never runtime conditions:
/// strict APIs return them, boolean convenience APIs log them and deny.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Rollout percent for '{flag}' out of range: {percent} (expected 0-100)")]
    PercentOutOfRange { flag: String, percent: i64 },

    #[error("Unknown tier: '{0}'")]
    UnknownTier(String),

    #[error("Malformed rollout entry: '{0}' (expected name=percent)")]
    MalformedRollout(String),

    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// Strictness of configuration handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Configuration errors surface immediately
    Development,
    /// Configuration errors are logged and resolved fail-closed
    #[default]
    Production,
}

impl Mode {
    pub fn is_development(self) -> bool {
        matches!(self, Mode::Development)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// hi-gate - feature flags and tier entitlements for Stay Hi
#[derive(Parser, Debug, Clone)]
#[command(name = "hi-gate")]
#[command(about = "Feature flag rollout and tier entitlement diagnostics for Stay Hi")]
pub struct Args {
    /// Supabase connection settings
    #[command(flatten)]
    pub supabase: SupabaseArgs,

    /// Local JSON fallback table used when the remote flag table is unreachable
    #[arg(long, env = "FLAGS_FALLBACK_PATH")]
    pub flags_fallback_path: Option<PathBuf>,

    /// File used to persist the anonymous identity across runs
    #[arg(long, env = "IDENTITY_STORE_PATH")]
    pub identity_store_path: Option<PathBuf>,

    /// Remote flag fetch timeout in milliseconds
    #[arg(long, env = "FLAG_FETCH_TIMEOUT_MS", default_value = "5000")]
    pub flag_fetch_timeout_ms: u64,

    /// Rollout overrides, e.g. "hifeed_enabled=25,hibase_shares_enabled=50"
    #[arg(long, env = "ROLLOUT")]
    pub rollout: Option<String>,

    /// Development mode (configuration errors fail loudly)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Supabase REST configuration
#[derive(Parser, Debug, Clone)]
pub struct SupabaseArgs {
    /// Project URL, e.g. https://xyz.supabase.co
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Anonymous (public) API key
    #[arg(long, env = "SUPABASE_ANON_KEY")]
    pub supabase_anon_key: Option<String>,

    /// Service role key, required for flag writes
    #[arg(long, env = "SUPABASE_SERVICE_KEY")]
    pub supabase_service_key: Option<String>,

    /// Table holding flag rows
    #[arg(long, env = "FLAGS_TABLE", default_value = "hi_flags")]
    pub flags_table: String,

    /// Table holding membership rows
    #[arg(long, env = "MEMBERSHIP_TABLE", default_value = "user_memberships")]
    pub membership_table: String,
}

impl SupabaseArgs {
    /// True when both URL and anon key are configured
    pub fn is_configured(&self) -> bool {
        self.supabase_url.as_deref().is_some_and(|u| !u.is_empty())
            && self.supabase_anon_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl Args {
    pub fn mode(&self) -> Mode {
        if self.dev_mode {
            Mode::Development
        } else {
            Mode::Production
        }
    }

    pub fn flag_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.flag_fetch_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flag_fetch_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "FLAG_FETCH_TIMEOUT_MS",
                reason: "must be greater than zero".to_string(),
            });
        }

        if let Some(url) = &self.supabase.supabase_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidSetting {
                    name: "SUPABASE_URL",
                    reason: format!("expected an http(s) URL, got '{}'", url),
                });
            }
        }

        if self.dev_mode {
            if let Some(spec) = &self.rollout {
                parse_rollout_spec(spec)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["hi-gate"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.flag_fetch_timeout(), Duration::from_secs(5));
        assert_eq!(args.supabase.flags_table, "hi_flags");
        assert_eq!(args.supabase.membership_table, "user_memberships");
        assert_eq!(args.log_format, LogFormat::Text);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let args = parse(&["--flag-fetch-timeout-ms", "0"]);
        assert!(matches!(
            args.validate(),
            Err(ConfigError::InvalidSetting { name: "FLAG_FETCH_TIMEOUT_MS", .. })
        ));
    }

    #[test]
    fn test_malformed_rollout_only_fatal_in_dev() {
        let prod = parse(&["--rollout", "hifeed_enabled=150"]);
        assert!(prod.validate().is_ok());

        let dev = parse(&["--dev-mode", "--rollout", "hifeed_enabled=150"]);
        assert_eq!(dev.mode(), Mode::Development);
        assert!(matches!(
            dev.validate(),
            Err(ConfigError::PercentOutOfRange { percent: 150, .. })
        ));
    }

    #[test]
    fn test_supabase_configured() {
        let args = parse(&[
            "--supabase-url",
            "https://example.supabase.co",
            "--supabase-anon-key",
            "anon",
        ]);
        assert!(args.supabase.is_configured());
        assert!(!parse(&[]).supabase.is_configured());
    }
}
