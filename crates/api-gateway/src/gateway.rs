//! Request execution path
//!
//! One `execute` call walks: cached credential → proactive refresh when
//! stale → bearer-authenticated dispatch → outcome classification. The
//! deliberate non-feature: a 401 from the resource API clears the cache and
//! reports `ReauthRequired` without retrying behind a fresh refresh — that
//! path only exists when the server invalidated the token out-of-band, and
//! retrying it automatically is how infinite refresh loops are born.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use token_manager::{Credential, CredentialCache, DurableStore, RefreshCoordinator, policy};

use crate::config::GatewayConfig;
use crate::outcome::{ApiFailure, ApiResult, classify_failure};

/// Authenticated request gateway over one remote API.
pub struct Gateway {
    client: reqwest::Client,
    base_url: String,
    refresh_buffer: Duration,
    cache: Arc<CredentialCache>,
    coordinator: RefreshCoordinator,
}

impl Gateway {
    /// Build a gateway from validated configuration and a durable store.
    pub fn from_config(config: &GatewayConfig, store: Arc<dyn DurableStore>) -> common::Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| common::Error::Config(format!("building HTTP client: {e}")))?;

        let cache = Arc::new(CredentialCache::new(store));
        let coordinator =
            RefreshCoordinator::new(client.clone(), config.refresh_url(), Arc::clone(&cache));

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            refresh_buffer: config.refresh_buffer(),
            cache,
            coordinator,
        })
    }

    /// Start applying external store changes to this gateway's cache.
    pub fn spawn_change_listener(&self) -> tokio::task::JoinHandle<()> {
        self.cache.spawn_change_listener()
    }

    /// Execute an authenticated request against `endpoint`.
    ///
    /// `body` is attached as JSON for POST and PUT, and discarded for any
    /// other method. The decoded response payload comes back on success;
    /// every failure mode is folded into [`ApiFailure`].
    pub async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<serde_json::Value>,
    ) -> ApiResult<T> {
        let result = self.run(endpoint, method, body).await;
        metrics::counter!("gateway_requests_total", "outcome" => outcome_label(&result))
            .increment(1);
        result
    }

    async fn run<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<serde_json::Value>,
    ) -> ApiResult<T> {
        let Some(credential) = self.cache.get().await else {
            debug!(endpoint, "no credential cached, not dispatching");
            return Err(ApiFailure::NotAuthenticated);
        };

        let credential = if policy::needs_refresh_within(
            &credential,
            policy::now_millis(),
            self.refresh_buffer,
        ) {
            debug!(endpoint, "credential stale, refreshing before dispatch");
            metrics::counter!("gateway_refresh_attempts_total").increment(1);
            match self.coordinator.refresh(credential).await {
                Some(refreshed) => refreshed,
                // Destructive failures already cleared the cache; transient
                // ones left it alone. Either way there is nothing to attach.
                None => return Err(ApiFailure::NotAuthenticated),
            }
        } else {
            credential
        };

        self.dispatch(endpoint, method, body, &credential).await
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<serde_json::Value>,
        credential: &Credential,
    ) -> ApiResult<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(credential.access_token.expose());
        if method == Method::POST || method == Method::PUT {
            if let Some(body) = body {
                request = request.json(&body);
            }
        } else if body.is_some() {
            debug!(endpoint, %method, "request body discarded for bodiless method");
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                // Transport-level trouble says nothing about the credential
                warn!(endpoint, error = %e, "request dispatch failed");
                let detail = if e.is_timeout() {
                    "request timed out".to_owned()
                } else if e.is_connect() {
                    format!("connection failed: {e}")
                } else {
                    format!("request failed: {e}")
                };
                return Err(ApiFailure::Transient(detail));
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            // The server invalidated the token out-of-band (e.g. revoked by
            // the user elsewhere). Clear state and hand control back; no
            // automatic refresh-and-retry here.
            warn!(endpoint, "access token rejected by resource API, clearing credential");
            if let Err(e) = self.cache.clear().await {
                warn!(error = %e, "failed to clear rejected credential from store");
            }
            return Err(ApiFailure::ReauthRequired);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(classify_failure(status.as_u16(), &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiFailure::Transient(format!("decoding response payload: {e}")))
    }

    /// Install tokens obtained from the interactive authorization flow.
    ///
    /// The durable write must succeed here — a login isn't finished until
    /// the credential would survive a process restart — so store errors
    /// propagate instead of being absorbed.
    pub async fn complete_auth(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in_secs: u64,
    ) -> token_manager::Result<()> {
        let credential = Credential::new(
            access_token,
            refresh_token,
            expires_in_secs,
            policy::now_millis(),
        );
        self.cache.set(credential).await
    }

    /// Cheap status query: credential present and not hard-expired.
    /// Never triggers a refresh or any other network work.
    pub async fn is_authenticated(&self) -> bool {
        match self.cache.get().await {
            Some(credential) => !policy::is_expired(&credential, policy::now_millis()),
            None => false,
        }
    }

    /// Forget the current credential, in memory and in the durable store.
    pub async fn logout(&self) -> token_manager::Result<()> {
        self.cache.clear().await
    }
}

fn outcome_label<T>(result: &ApiResult<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(ApiFailure::NotAuthenticated) => "not_authenticated",
        Err(ApiFailure::ReauthRequired) => "reauth_required",
        Err(ApiFailure::Transient(_)) => "transient",
        Err(ApiFailure::RemoteRejected { .. }) => "remote_rejected",
    }
}
