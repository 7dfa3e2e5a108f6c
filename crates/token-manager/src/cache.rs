//! In-process credential cache
//!
//! The single authoritative in-memory view of the current credential,
//! lazily hydrated from the durable store on first access and kept coherent
//! afterwards via the store's change-notification channel — `get()` never
//! re-reads storage once hydrated.
//!
//! The cache distinguishes "not yet checked" from "checked, nothing there":
//! a hydration that finds nothing (or can't reach storage at all) still
//! marks the cache hydrated, so a broken store degrades to a working
//! in-memory cache for the lifetime of the process.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::store::DurableStore;

/// Key under which the credential lives in the durable store.
pub const CREDENTIAL_KEY: &str = "tokenData";

enum CacheState {
    Unhydrated,
    Hydrated(Option<Credential>),
}

/// Cached view of the current credential, backed by a durable store.
pub struct CredentialCache {
    store: Arc<dyn DurableStore>,
    state: Mutex<CacheState>,
}

impl CredentialCache {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self {
            store,
            state: Mutex::new(CacheState::Unhydrated),
        }
    }

    /// Current credential, hydrating from the durable store on first call.
    ///
    /// Holding the state lock across the hydrating read means concurrent
    /// first callers rendezvous on a single storage read. A store error
    /// hydrates to absent rather than propagating: the caller can't do
    /// anything useful with a storage failure here, and the cache keeps
    /// working in memory.
    pub async fn get(&self) -> Option<Credential> {
        let mut state = self.state.lock().await;
        if let CacheState::Hydrated(current) = &*state {
            return current.clone();
        }

        let value = match self.store.read(CREDENTIAL_KEY).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "credential store unavailable, treating as absent");
                None
            }
        };
        let credential = value.and_then(|v| match serde_json::from_value::<Credential>(v) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!(error = %e, "stored credential is malformed, treating as absent");
                None
            }
        });
        debug!(present = credential.is_some(), "credential cache hydrated");
        *state = CacheState::Hydrated(credential.clone());
        credential
    }

    /// Install a new current credential: memory first, then the durable
    /// write.
    ///
    /// Any caller observing the cache after `set` returns sees the new
    /// value even if the durable write failed — the error is returned for
    /// callers that need durability confirmation (interactive login), but
    /// ordinary refresh paths may log and carry on.
    pub async fn set(&self, credential: Credential) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            *state = CacheState::Hydrated(Some(credential.clone()));
        }
        let value = serde_json::to_value(&credential)
            .map_err(|e| Error::Parse(format!("serializing credential: {e}")))?;
        self.store.write(CREDENTIAL_KEY, value).await
    }

    /// Drop the current credential: memory becomes known-absent, then the
    /// durable entry is removed.
    pub async fn clear(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            *state = CacheState::Hydrated(None);
        }
        self.store.remove(CREDENTIAL_KEY).await
    }

    /// Spawn a background task that applies store change events to this
    /// cache.
    ///
    /// Events for the credential key overwrite the in-memory value
    /// verbatim — this is what keeps several processes sharing one store
    /// eventually consistent without polling. A lagged receiver just
    /// resumes with the next event (last writer wins anyway).
    pub fn spawn_change_listener(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        let mut events = self.store.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.key == CREDENTIAL_KEY => {
                        let credential = match event.value {
                            Some(value) => match serde_json::from_value::<Credential>(value) {
                                Ok(credential) => Some(credential),
                                Err(e) => {
                                    // Unintelligible external write: keep the
                                    // current view rather than guessing.
                                    warn!(error = %e, "ignoring malformed credential change event");
                                    continue;
                                }
                            },
                            None => None,
                        };
                        debug!(
                            present = credential.is_some(),
                            "applying external credential change"
                        );
                        let mut state = cache.state.lock().await;
                        *state = CacheState::Hydrated(credential);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "credential change listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
