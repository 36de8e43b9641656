//! hi-gate - feature flag and entitlement diagnostics for Stay Hi

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use hi_gate::{
    config::LogFormat,
    tiers::{check_access, effective_tier, trial_status, MembershipRecord, RawMembership},
    Args, HiContext,
};

#[derive(Parser, Debug)]
#[command(name = "hi-gate", version)]
#[command(about = "Feature flag rollout and tier entitlement diagnostics for Stay Hi")]
struct Cli {
    #[command(flatten)]
    args: Args,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the flag table and list every flag with its origin
    Flags,

    /// Check one flag for an identity (defaults to the current identity)
    Check {
        #[arg(long)]
        flag: String,
        #[arg(long)]
        identity: Option<String>,
    },

    /// Resolve the effective tier of a membership
    Tier {
        /// Raw tier name as stored, e.g. "trial", "beta", "gold"
        #[arg(long)]
        tier: String,
        /// Trial end (RFC 3339)
        #[arg(long)]
        trial_end: Option<String>,
        /// Evaluate at this instant instead of now (RFC 3339)
        #[arg(long)]
        now: Option<String>,
    },

    /// Check a tier against a required tier
    Access {
        #[arg(long)]
        tier: String,
        #[arg(long)]
        required: String,
    },

    /// Sample random identities against a flag's rollout
    Sample {
        #[arg(long)]
        flag: String,
        #[arg(long, default_value = "10000")]
        count: usize,
        /// Override the rollout percentage before sampling
        #[arg(long)]
        percent: Option<i64>,
    },

    /// Show the identity used for cohort bucketing
    Identity,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let Cli { args, command } = Cli::parse();

    // Initialize tracing/logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("hi_gate={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    match args.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!(
        mode = ?args.mode(),
        supabase = args.supabase.is_configured(),
        fallback = ?args.flags_fallback_path,
        "hi-gate starting"
    );

    let (ctx, _auth) = HiContext::from_args(&args)?;

    match command {
        Command::Flags => {
            let origin = ctx.refresh().await;
            print_json(&json!({
                "origin": origin,
                "flags": ctx.all_flags(),
                "rollout": ctx
                    .rollout()
                    .entries()
                    .iter()
                    .map(|e| (e.flag_name.clone(), e.percent.get()))
                    .collect::<std::collections::BTreeMap<_, _>>(),
            }))?;
        }

        Command::Check { flag, identity } => {
            let identity = identity.unwrap_or_else(|| ctx.identity().resolve().value);
            ctx.flags().load().await;
            let decision = ctx.gate().decide(&identity, &flag);
            print_json(&json!({
                "flag": flag,
                "identity": identity,
                "enabled": decision.enabled,
                "reason": decision.reason,
                "origin": ctx.flags().origin(),
            }))?;
        }

        Command::Tier {
            tier,
            trial_end,
            now,
        } => {
            let record = MembershipRecord::try_from(RawMembership {
                tier: Some(tier),
                trial_end,
                ..Default::default()
            })?;
            let now = match now {
                Some(now) => DateTime::parse_from_rfc3339(&now)
                    .with_context(|| format!("invalid --now timestamp '{}'", now))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };

            let tier = effective_tier(Some(&record), now);
            let profile = tier.profile();
            print_json(&json!({
                "raw_tier": record.tier,
                "effective_tier": tier,
                "rank": tier.rank(),
                "display_name": profile.display_name,
                "trial": trial_status(&record, now),
                "evaluated_at": now,
            }))?;
        }

        Command::Access { tier, required } => {
            let allowed = check_access(&tier, &required)?;
            print_json(&json!({
                "tier": tier,
                "required": required,
                "allowed": allowed,
            }))?;
        }

        Command::Sample {
            flag,
            count,
            percent,
        } => {
            if let Some(percent) = percent {
                ctx.rollout().set(&flag, percent)?;
            }
            ctx.flags().load().await;
            let identities = (0..count).map(|_| Uuid::new_v4().to_string());
            print_json(&ctx.gate().sample_distribution(&flag, identities))?;
        }

        Command::Identity => {
            print_json(&ctx.identity().resolve())?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
