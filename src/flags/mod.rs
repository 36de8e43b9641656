//! Feature flags
//!
//! - **FlagStore**: the resolved flag table, swapped wholesale on every load
//! - **Sources**: remote table, local JSON fallback, in-memory rows
//! - **Defaults**: hardcoded last-resort table

pub mod defaults;
pub mod source;
pub mod store;

pub use defaults::hardcoded_defaults;
pub use source::{FileFlagSource, FlagRow, FlagSource, FlagSourceError, StaticFlagSource};
pub use store::{Flag, FlagDetails, FlagOrigin, FlagSnapshot, FlagStore, FlagStoreConfig};
