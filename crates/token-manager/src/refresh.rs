//! Token refresh with single-flight coordination
//!
//! The exchange itself is one POST to the authorization endpoint:
//! `{ refreshToken }` in, `{ accessToken, refreshToken?, expiresInSeconds }`
//! out. The coordinator wraps it so that at most one exchange is in flight
//! at a time — concurrent callers join the outstanding one and share its
//! outcome instead of racing a second request (and burning a second use of
//! the refresh token) against the server.
//!
//! Failure handling is the load-bearing part:
//! - 401/403 from the endpoint means the refresh token itself is dead: the
//!   cache is cleared and the caller must drive interactive re-auth.
//! - Anything else (network error, 5xx, malformed body) is transient: the
//!   cached credential is left alone so a later attempt can still use it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::Shared;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::CredentialCache;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::policy;

/// Response from the authorization endpoint's refresh operation.
///
/// `refresh_token` may be omitted, meaning the previous one stays valid.
/// `expires_in_seconds` is a delta from response time; the caller fixes the
/// absolute expiry when constructing the credential.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in_seconds: u64,
}

/// Exchange a refresh token for a new access token.
///
/// Distinguishes destructive rejection (401/403 → `RefreshRejected`) from
/// everything else (`Http`/`RefreshFailed`); the coordinator branches on
/// that distinction.
pub async fn exchange(
    client: &reqwest::Client,
    refresh_url: &str,
    refresh_token: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(refresh_url)
        .json(&serde_json::json!({ "refreshToken": refresh_token }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 401/403 means the refresh token is revoked, expired, or invalid
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::RefreshRejected(format!(
                "endpoint returned {status}: {body}"
            )));
        }

        return Err(Error::RefreshFailed(format!(
            "endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::RefreshFailed(format!("invalid refresh response: {e}")))
}

type SharedRefresh = Shared<Pin<Box<dyn Future<Output = Option<Credential>> + Send>>>;

/// Single-flight refresh coordinator.
///
/// Holds at most one outstanding refresh handle. The handle is a shared
/// future over a spawned task, so the refresh always runs to completion and
/// updates the cache even if every caller that wanted it has given up — the
/// result benefits whoever asks next.
pub struct RefreshCoordinator {
    client: reqwest::Client,
    refresh_url: String,
    cache: Arc<CredentialCache>,
    in_flight: Arc<Mutex<Option<SharedRefresh>>>,
}

impl RefreshCoordinator {
    pub fn new(client: reqwest::Client, refresh_url: String, cache: Arc<CredentialCache>) -> Self {
        Self {
            client,
            refresh_url,
            cache,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Refresh `current`, joining an in-flight refresh if one exists.
    ///
    /// Returns the new credential, or `None` when the refresh failed — the
    /// cache tells the caller whether that failure was destructive (cleared)
    /// or transient (previous credential intact).
    pub async fn refresh(&self, current: Credential) -> Option<Credential> {
        let handle = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.as_ref() {
                Some(handle) => {
                    debug!("refresh already in flight, joining");
                    handle.clone()
                }
                None => {
                    let task = tokio::spawn(run_refresh(
                        self.client.clone(),
                        self.refresh_url.clone(),
                        Arc::clone(&self.cache),
                        Arc::clone(&self.in_flight),
                        current,
                    ));
                    let handle: SharedRefresh =
                        FutureExt::boxed(async move { task.await.unwrap_or(None) }).shared();
                    *in_flight = Some(handle.clone());
                    handle
                }
            }
        };
        handle.await
    }
}

/// The single outstanding refresh. Clears the in-flight handle on every
/// completion path before resolving, so the next `refresh` call after this
/// one completes starts fresh rather than observing a stale outcome.
async fn run_refresh(
    client: reqwest::Client,
    refresh_url: String,
    cache: Arc<CredentialCache>,
    in_flight: Arc<Mutex<Option<SharedRefresh>>>,
    current: Credential,
) -> Option<Credential> {
    let result = match exchange(&client, &refresh_url, current.refresh_token.expose()).await {
        Ok(response) => {
            let credential = Credential::from_refresh(response, &current, policy::now_millis());
            if let Err(e) = cache.set(credential.clone()).await {
                warn!(error = %e, "refreshed credential not persisted, keeping in-memory copy");
            }
            info!("token refresh succeeded");
            Some(credential)
        }
        Err(Error::RefreshRejected(msg)) => {
            warn!(error = %msg, "refresh token rejected, clearing stored credential");
            if let Err(e) = cache.clear().await {
                warn!(error = %e, "failed to clear stored credential");
            }
            None
        }
        Err(e) => {
            warn!(error = %e, "token refresh failed (transient), keeping stored credential");
            None
        }
    };
    in_flight.lock().await.take();
    result
}
