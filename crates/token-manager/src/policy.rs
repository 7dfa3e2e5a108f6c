//! Token lifecycle policy
//!
//! Pure decision logic over (credential, now). `needs_refresh` fires a
//! buffer ahead of hard expiry so a refresh can complete before the server
//! would start rejecting the access token; `is_expired` answers the cheap
//! "are we authenticated at all" question without forcing any network work.
//! Callers always pass `now` in, which keeps both checks trivially testable.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::credential::Credential;

/// Lead time before hard expiry at which a proactive refresh is triggered.
/// Sized to tolerate network latency and modest clock skew.
pub const REFRESH_BUFFER: Duration = Duration::from_secs(5 * 60);

/// Whether a refresh should be started before using this credential,
/// using the default [`REFRESH_BUFFER`].
pub fn needs_refresh(credential: &Credential, now_millis: u64) -> bool {
    needs_refresh_within(credential, now_millis, REFRESH_BUFFER)
}

/// Whether a refresh should be started, with an explicit buffer.
pub fn needs_refresh_within(credential: &Credential, now_millis: u64, buffer: Duration) -> bool {
    now_millis >= credential.expires_at.saturating_sub(buffer.as_millis() as u64)
}

/// Whether the access token is past its hard expiry.
pub fn is_expired(credential: &Credential, now_millis: u64) -> bool {
    now_millis >= credential.expires_at
}

/// Current wall-clock time as unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential_expiring_at(expires_at: u64) -> Credential {
        Credential {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            expires_at,
        }
    }

    const BUFFER_MS: u64 = 5 * 60 * 1000;

    #[test]
    fn fresh_credential_needs_nothing() {
        let cred = credential_expiring_at(10_000_000);
        let now = 10_000_000 - BUFFER_MS - 1;
        assert!(!needs_refresh(&cred, now));
        assert!(!is_expired(&cred, now));
    }

    #[test]
    fn needs_refresh_inside_buffer_window() {
        let cred = credential_expiring_at(10_000_000);
        // Exactly at the buffer boundary
        assert!(needs_refresh(&cred, 10_000_000 - BUFFER_MS));
        // Inside the window but not yet expired
        let now = 10_000_000 - 1;
        assert!(needs_refresh(&cred, now));
        assert!(!is_expired(&cred, now));
    }

    #[test]
    fn expired_at_the_boundary() {
        let cred = credential_expiring_at(10_000_000);
        assert!(is_expired(&cred, 10_000_000));
        assert!(!is_expired(&cred, 9_999_999));
    }

    #[test]
    fn expired_implies_needs_refresh() {
        // The proactive check must be at least as eager as the hard-expiry
        // check, for any expiry and any instant around it.
        for expires_at in [0u64, 1, BUFFER_MS, 10_000_000, u64::MAX - 1] {
            let cred = credential_expiring_at(expires_at);
            for delta in [0i64, -1, 1, -(BUFFER_MS as i64), BUFFER_MS as i64] {
                let now = expires_at.saturating_add_signed(delta);
                if is_expired(&cred, now) {
                    assert!(
                        needs_refresh(&cred, now),
                        "expired but not flagged for refresh at expires_at={expires_at} now={now}"
                    );
                }
            }
        }
    }

    #[test]
    fn small_expiry_does_not_underflow() {
        // expires_at smaller than the buffer: saturating_sub pins the
        // threshold at zero, so the credential always needs a refresh.
        let cred = credential_expiring_at(1_000);
        assert!(needs_refresh(&cred, 0));
    }

    #[test]
    fn custom_buffer_is_honored() {
        let cred = credential_expiring_at(10_000_000);
        let narrow = Duration::from_secs(1);
        assert!(!needs_refresh_within(&cred, 10_000_000 - 1_001, narrow));
        assert!(needs_refresh_within(&cred, 10_000_000 - 1_000, narrow));
    }
}
