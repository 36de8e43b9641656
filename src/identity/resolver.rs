//! IdentityResolver - the hashing input for cohort bucketing
//!
//! Priority: signed-in user id, then a persisted anonymous id, then a fixed
//! placeholder. The placeholder collapses every storage-less visitor into one
//! bucket and is logged as a degraded mode.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::auth::AuthState;
use super::storage::KeyValueStore;

/// Storage key holding the anonymous identity
pub const ANONYMOUS_ID_KEY: &str = "hi_anonymous_id";

/// Identity used when nothing better is available
pub const PLACEHOLDER_IDENTITY: &str = "anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    User,
    Anonymous,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub value: String,
    pub kind: IdentityKind,
}

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

pub struct IdentityResolver {
    auth: watch::Receiver<AuthState>,
    storage: Option<Arc<dyn KeyValueStore>>,
    anonymous: Mutex<Option<String>>,
}

impl IdentityResolver {
    pub fn new(auth: watch::Receiver<AuthState>, storage: Option<Arc<dyn KeyValueStore>>) -> Self {
        Self {
            auth,
            storage,
            anonymous: Mutex::new(None),
        }
    }

    /// Current identity
    pub fn resolve(&self) -> Identity {
        if let Some(user_id) = self.user_id() {
            return Identity {
                value: user_id,
                kind: IdentityKind::User,
            };
        }

        match self.anonymous_id() {
            Some(value) => Identity {
                value,
                kind: IdentityKind::Anonymous,
            },
            None => {
                warn!("No persistent storage for anonymous identity; using placeholder");
                Identity {
                    value: PLACEHOLDER_IDENTITY.to_string(),
                    kind: IdentityKind::Placeholder,
                }
            }
        }
    }

    /// Signed-in user id, if any
    pub fn user_id(&self) -> Option<String> {
        self.auth.borrow().user_id().map(str::to_string)
    }

    /// Receiver for auth changes, for callers that react to sign-in/out
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.auth.clone()
    }

    /// Read or create the persisted anonymous id. Ids that cannot be persisted
    /// are never handed out.
    fn anonymous_id(&self) -> Option<String> {
        let mut cached = self.anonymous.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = cached.as_ref() {
            return Some(id.clone());
        }

        let storage = self.storage.as_ref()?;
        let id = match storage.get(ANONYMOUS_ID_KEY) {
            Ok(Some(id)) if !id.is_empty() => {
                debug!("Loaded persisted anonymous identity");
                id
            }
            Ok(_) => {
                let id = format!("anon_{}", Uuid::new_v4().simple());
                if let Err(e) = storage.set(ANONYMOUS_ID_KEY, &id) {
                    warn!(error = %e, "Could not persist anonymous identity");
                    return None;
                }
                info!("Created anonymous identity");
                id
            }
            Err(e) => {
                warn!(error = %e, "Could not read anonymous identity");
                return None;
            }
        };

        *cached = Some(id.clone());
        Some(id)
    }
}
