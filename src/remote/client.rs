//! Supabase PostgREST client
//!
//! Reads the flag table and membership rows over the REST interface. Flag
//! writes need the service role key; without it the client is read-only.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::MembershipSource;
use crate::config::SupabaseArgs;
use crate::flags::{FlagRow, FlagSource, FlagSourceError};
use crate::tiers::RawMembership;

const FLAG_COLUMNS: &str = "flag_name,enabled,description";
const MEMBERSHIP_COLUMNS: &str = "tier,trial_start,trial_end,status";

/// Configuration for the Supabase client
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL without the `/rest/v1` suffix
    pub url: String,
    pub anon_key: String,
    pub service_key: Option<String>,
    pub flags_table: String,
    pub membership_table: String,
    /// Timeout for HTTP requests (default: 5 seconds)
    pub request_timeout: Duration,
}

impl SupabaseConfig {
    /// Build from CLI/env settings; `None` when URL or anon key is missing
    pub fn from_args(args: &SupabaseArgs, request_timeout: Duration) -> Option<Self> {
        if !args.is_configured() {
            return None;
        }
        Some(Self {
            url: args.supabase_url.clone()?,
            anon_key: args.supabase_anon_key.clone()?,
            service_key: args.supabase_service_key.clone().filter(|k| !k.is_empty()),
            flags_table: args.flags_table.clone(),
            membership_table: args.membership_table.clone(),
            request_timeout,
        })
    }
}

/// Body of a flag upsert
#[derive(Serialize)]
struct FlagUpsert<'a> {
    flag_name: &'a str,
    enabled: bool,
    description: Option<&'a str>,
}

pub struct SupabaseClient {
    config: SupabaseConfig,
    http_client: reqwest::Client,
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("hi-gate/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url.trim_end_matches('/'), table)
    }

    /// `GET` URL for the whole flag table
    pub fn flags_url(&self) -> String {
        format!(
            "{}?select={}",
            self.table_url(&self.config.flags_table),
            FLAG_COLUMNS
        )
    }

    /// `POST` URL for a flag upsert keyed on `flag_name`
    pub fn flag_upsert_url(&self) -> String {
        format!(
            "{}?on_conflict=flag_name",
            self.table_url(&self.config.flags_table)
        )
    }

    /// `GET` URL for one user's membership row
    pub fn membership_url(&self, user_id: &str) -> String {
        format!(
            "{}?select={}&user_id=eq.{}&limit=1",
            self.table_url(&self.config.membership_table),
            MEMBERSHIP_COLUMNS,
            urlencoding::encode(user_id)
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder, key: &str) -> reqwest::RequestBuilder {
        request
            .header("apikey", key)
            .header("Authorization", format!("Bearer {}", key))
            .header("Accept", "application/json")
    }

    async fn get_rows<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Vec<T>, FlagSourceError> {
        let response = self
            .authorized(self.http_client.get(url), &self.config.anon_key)
            .send()
            .await
            .map_err(|e| FlagSourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlagSourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| FlagSourceError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl FlagSource for SupabaseClient {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn fetch_all(&self) -> Result<Vec<FlagRow>, FlagSourceError> {
        let url = self.flags_url();
        debug!(url = %url, "Fetching flag table");
        self.get_rows(&url).await
    }

    async fn upsert(&self, row: &FlagRow) -> Result<(), FlagSourceError> {
        let Some(service_key) = self.config.service_key.as_deref() else {
            return Err(FlagSourceError::ReadOnly(self.name().to_string()));
        };

        let body = [FlagUpsert {
            flag_name: &row.name,
            enabled: row.enabled,
            description: row.description.as_deref(),
        }];

        let response = self
            .authorized(self.http_client.post(self.flag_upsert_url()), service_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(|e| FlagSourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(flag = %row.name, status = status.as_u16(), "Flag upsert rejected");
            return Err(FlagSourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl MembershipSource for SupabaseClient {
    async fn fetch(&self, user_id: &str) -> Result<Option<RawMembership>, FlagSourceError> {
        let url = self.membership_url(user_id);
        debug!(user_id = %user_id, "Fetching membership");
        let rows: Vec<RawMembership> = self.get_rows(&url).await?;
        Ok(rows.into_iter().next())
    }
}
