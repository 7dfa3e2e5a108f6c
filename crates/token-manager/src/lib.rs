//! Credential lifecycle management
//!
//! Holds the current OAuth-style credential (access token, refresh token,
//! expiry), keeps it coherent with a durable key-value store, decides when
//! it is stale, and refreshes it at most once at a time regardless of how
//! many callers need the result. This crate is a standalone library with no
//! dependency on the request gateway — it can be tested and used
//! independently.
//!
//! Credential flow:
//! 1. Interactive auth completes externally; tokens installed via
//!    `CredentialCache::set()`
//! 2. Request path calls `CredentialCache::get()` (hydrates from the durable
//!    store on first access)
//! 3. `policy::needs_refresh()` decides staleness ahead of hard expiry
//! 4. `RefreshCoordinator::refresh()` exchanges the refresh token, with
//!    single-flight semantics under concurrent callers
//! 5. Refreshed credential persisted via `CredentialCache::set()`; external
//!    store changes flow back in via `spawn_change_listener()`

pub mod cache;
pub mod credential;
pub mod error;
pub mod policy;
pub mod refresh;
pub mod store;

pub use cache::{CREDENTIAL_KEY, CredentialCache};
pub use credential::Credential;
pub use error::{Error, Result};
pub use refresh::{RefreshCoordinator, TokenResponse};
pub use store::{DurableStore, FileStore, StoreEvent};
