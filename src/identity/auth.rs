//! Auth state notifications
//!
//! The session layer publishes sign-in/sign-out here; identity consumers hold
//! receivers and always see the latest state without polling.

use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn { user_id: String },
}

impl AuthState {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuthState::SignedIn { user_id } if !user_id.is_empty() => Some(user_id),
            _ => None,
        }
    }
}

/// Publisher side of the auth channel
pub struct AuthEvents {
    tx: watch::Sender<AuthState>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthState::SignedOut);
        Self { tx }
    }

    pub fn publish(&self, state: AuthState) {
        match &state {
            AuthState::SignedIn { user_id } => info!(user_id = %user_id, "Auth state: signed in"),
            AuthState::SignedOut => info!("Auth state: signed out"),
        }
        self.tx.send_replace(state);
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        self.publish(AuthState::SignedIn {
            user_id: user_id.into(),
        });
    }

    pub fn sign_out(&self) {
        self.publish(AuthState::SignedOut);
    }

    pub fn current(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}
