//! Failure taxonomy for gateway requests
//!
//! Every way an `execute` call can go wrong maps to exactly one of four
//! kinds. The split that matters operationally: `NotAuthenticated` and
//! `ReauthRequired` should drive the caller to a reconnect affordance,
//! while `Transient` and `RemoteRejected` are safe to retry or surface
//! without discarding stored credentials.

use thiserror::Error;

/// Failure result of a gateway request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiFailure {
    /// No credential cached and none obtainable; the caller must run the
    /// interactive authorization flow.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A credential existed but the server rejected it destructively; local
    /// state has already been cleared.
    #[error("credential rejected, re-authentication required")]
    ReauthRequired,

    /// Network or server trouble that says nothing about the credential.
    /// Safe to retry later without clearing state.
    #[error("transient request failure: {0}")]
    Transient(String),

    /// The remote API returned a defined application-level error unrelated
    /// to auth. Surfaced verbatim, no state change.
    #[error("remote API error ({status}): {message}")]
    RemoteRejected { status: u16, message: String },
}

impl ApiFailure {
    /// Whether the caller should drive re-authentication (the UI's
    /// "reconnect" affordance) rather than retrying.
    pub fn reauth_required(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::ReauthRequired)
    }
}

/// Result alias for gateway requests.
pub type ApiResult<T> = std::result::Result<T, ApiFailure>;

/// Classify a non-2xx, non-401 resource response.
///
/// Server-side trouble (408, 429, 5xx) is transient; other client errors
/// are application-level rejections carried through with their extracted
/// message.
pub fn classify_failure(status: u16, body: &str) -> ApiFailure {
    match status {
        408 | 429 | 500..=599 => {
            ApiFailure::Transient(format!("{status}: {}", extract_error_message(body)))
        }
        _ => ApiFailure::RemoteRejected {
            status,
            message: extract_error_message(body),
        },
    }
}

/// Best-effort extraction of a human-readable error message.
///
/// Tries the conventional `message` then `error` fields of a JSON payload;
/// anything unparsable falls back to the raw body.
pub fn extract_error_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(payload) => payload
            .get("message")
            .and_then(serde_json::Value::as_str)
            .or_else(|| payload.get("error").and_then(serde_json::Value::as_str))
            .map(str::to_owned)
            .unwrap_or_else(|| body.to_owned()),
        Err(_) => body.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_prefers_message_field() {
        let body = r#"{"message":"workflow not found","error":"other"}"#;
        assert_eq!(extract_error_message(body), "workflow not found");
    }

    #[test]
    fn extract_falls_back_to_error_field() {
        let body = r#"{"error":"invalid payload"}"#;
        assert_eq!(extract_error_message(body), "invalid payload");
    }

    #[test]
    fn extract_falls_back_to_raw_body() {
        assert_eq!(extract_error_message("plain text failure"), "plain text failure");
        // Parsable JSON without the conventional fields is also raw
        let body = r#"{"code":42}"#;
        assert_eq!(extract_error_message(body), body);
    }

    #[test]
    fn extract_ignores_non_string_fields() {
        let body = r#"{"message":{"nested":true},"error":"real cause"}"#;
        assert_eq!(extract_error_message(body), "real cause");
    }

    #[test]
    fn classify_5xx_is_transient() {
        for status in [500, 502, 503, 504] {
            assert!(matches!(
                classify_failure(status, "oops"),
                ApiFailure::Transient(_)
            ));
        }
    }

    #[test]
    fn classify_timeout_and_rate_limit_are_transient() {
        assert!(matches!(classify_failure(408, ""), ApiFailure::Transient(_)));
        assert!(matches!(classify_failure(429, ""), ApiFailure::Transient(_)));
    }

    #[test]
    fn classify_client_error_is_remote_rejected() {
        let failure = classify_failure(404, r#"{"message":"no such workflow"}"#);
        assert_eq!(
            failure,
            ApiFailure::RemoteRejected {
                status: 404,
                message: "no such workflow".into()
            }
        );
    }

    #[test]
    fn reauth_required_covers_auth_kinds_only() {
        assert!(ApiFailure::NotAuthenticated.reauth_required());
        assert!(ApiFailure::ReauthRequired.reauth_required());
        assert!(!ApiFailure::Transient("x".into()).reauth_required());
        assert!(
            !ApiFailure::RemoteRejected {
                status: 404,
                message: "x".into()
            }
            .reauth_required()
        );
    }

    #[test]
    fn display_includes_status_and_message() {
        let failure = ApiFailure::RemoteRejected {
            status: 422,
            message: "bad node".into(),
        };
        assert_eq!(failure.to_string(), "remote API error (422): bad node");
    }
}
