//! The credential triple: access token, refresh token, expiry
//!
//! A `Credential` is immutable once constructed — refreshing builds a new
//! value rather than mutating fields, so a concurrent reader can never
//! observe a half-updated triple. `expires_at` is always an absolute unix
//! millisecond timestamp computed at construction time from the endpoint's
//! `expiresInSeconds` delta.
//!
//! Serialized field names are camelCase to match the persisted form the
//! durable store already holds (`accessToken`/`refreshToken`/`expiresAt`).

use common::Secret;
use serde::{Deserialize, Serialize};

use crate::refresh::TokenResponse;

/// One authenticated session's token material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Short-lived bearer token presented to the resource API
    pub access_token: Secret<String>,
    /// Long-lived token presented only to the authorization endpoint
    pub refresh_token: Secret<String>,
    /// Expiration as unix timestamp in milliseconds (absolute, not a delta)
    pub expires_at: u64,
}

impl Credential {
    /// Build a credential from the interactive auth flow's token grant.
    ///
    /// `expires_in_secs` is the delta the endpoint returned; the absolute
    /// expiry is fixed here, at issue time.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in_secs: u64,
        now_millis: u64,
    ) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            refresh_token: Secret::new(refresh_token.into()),
            expires_at: now_millis + expires_in_secs * 1000,
        }
    }

    /// Build the successor credential from a refresh response.
    ///
    /// Servers are allowed to omit `refreshToken` from the response, which
    /// means "keep using the previous one" — refresh tokens are not always
    /// rotated. That fallback is a deliberate merge rule, not a default.
    pub fn from_refresh(response: TokenResponse, previous: &Credential, now_millis: u64) -> Self {
        let refresh_token = match response.refresh_token {
            Some(rotated) => Secret::new(rotated),
            None => previous.refresh_token.clone(),
        };
        Self {
            access_token: Secret::new(response.access_token),
            refresh_token,
            expires_at: now_millis + response.expires_in_seconds * 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_at_is_absolute() {
        let cred = Credential::new("a1", "r1", 3600, 1_700_000_000_000);
        assert_eq!(cred.expires_at, 1_700_000_000_000 + 3_600_000);
    }

    #[test]
    fn serde_roundtrip_is_identical() {
        let cred = Credential::new("a1", "r1", 3600, 1_700_000_000_000);
        let json = serde_json::to_value(&cred).unwrap();
        let back: Credential = serde_json::from_value(json).unwrap();
        assert_eq!(back, cred);
    }

    #[test]
    fn serialized_field_names_are_camel_case() {
        let cred = Credential::new("a1", "r1", 60, 0);
        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json["accessToken"], "a1");
        assert_eq!(json["refreshToken"], "r1");
        assert_eq!(json["expiresAt"], 60_000);
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let cred = Credential::new("at_secret", "rt_secret", 3600, 0);
        let debug = format!("{cred:?}");
        assert!(!debug.contains("at_secret"));
        assert!(!debug.contains("rt_secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn refresh_rotates_token_when_present() {
        let previous = Credential::new("a1", "r1", 10, 1_000_000);
        let response = TokenResponse {
            access_token: "a2".into(),
            refresh_token: Some("r2".into()),
            expires_in_seconds: 3600,
        };
        let next = Credential::from_refresh(response, &previous, 2_000_000);
        assert_eq!(next.access_token.expose(), "a2");
        assert_eq!(next.refresh_token.expose(), "r2");
        assert_eq!(next.expires_at, 2_000_000 + 3_600_000);
    }

    #[test]
    fn refresh_reuses_previous_token_when_omitted() {
        let previous = Credential::new("a1", "r1", 10, 1_000_000);
        let response = TokenResponse {
            access_token: "a2".into(),
            refresh_token: None,
            expires_in_seconds: 3600,
        };
        let next = Credential::from_refresh(response, &previous, 2_000_000);
        assert_eq!(next.access_token.expose(), "a2");
        assert_eq!(next.refresh_token.expose(), "r1");
    }

    #[test]
    fn refresh_leaves_previous_value_untouched() {
        let previous = Credential::new("a1", "r1", 10, 1_000_000);
        let response = TokenResponse {
            access_token: "a2".into(),
            refresh_token: Some("r2".into()),
            expires_in_seconds: 3600,
        };
        let _next = Credential::from_refresh(response, &previous, 2_000_000);
        assert_eq!(previous.access_token.expose(), "a1");
        assert_eq!(previous.refresh_token.expose(), "r1");
    }
}
