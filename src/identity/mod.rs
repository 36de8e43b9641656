//! Identity resolution for cohort bucketing
//!
//! - **AuthEvents**: sign-in/sign-out notifications over a watch channel
//! - **IdentityResolver**: user id, persisted anonymous id, or placeholder
//! - **Storage**: key-value persistence for the anonymous id

pub mod auth;
pub mod resolver;
pub mod storage;

pub use auth::{AuthEvents, AuthState};
pub use resolver::{Identity, IdentityKind, IdentityResolver, ANONYMOUS_ID_KEY, PLACEHOLDER_IDENTITY};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
