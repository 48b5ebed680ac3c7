//! Credential pair and client-side access token inspection.
//!
//! Nothing in this module verifies a signature. [`UnverifiedAccessClaims`]
//! only reads the payload segment so the client can skip restoring a session
//! whose token has obviously expired; the backend remains the authority.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use matchdesk_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Access and refresh token issued together.
///
/// Both tokens are always present; a session never holds only one of them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireTokenPair")]
pub struct TokenPair {
    access_token: String,
    refresh_token: String,
}

impl TokenPair {
    /// Creates a validated token pair.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> AppResult<Self> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();

        if access_token.trim().is_empty() {
            return Err(AppError::Validation(
                "access token must not be empty".to_owned(),
            ));
        }
        if refresh_token.trim().is_empty() {
            return Err(AppError::Validation(
                "refresh token must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            access_token,
            refresh_token,
        })
    }

    /// Returns the bearer access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access_token.as_str()
    }

    /// Returns the opaque refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        self.refresh_token.as_str()
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTokenPair {
    access_token: String,
    refresh_token: String,
}

impl TryFrom<WireTokenPair> for TokenPair {
    type Error = AppError;

    fn try_from(value: WireTokenPair) -> Result<Self, Self::Error> {
        Self::new(value.access_token, value.refresh_token)
    }
}

/// Claims read from an access token payload without signature verification.
#[derive(Debug, Clone, PartialEq)]
pub struct UnverifiedAccessClaims {
    expires_at_seconds: f64,
    subject: Option<String>,
}

#[derive(Deserialize)]
struct WireClaims {
    exp: Option<f64>,
    sub: Option<String>,
}

impl UnverifiedAccessClaims {
    /// Decodes the payload segment of a compact JWT.
    ///
    /// Fails when the token has no payload segment, the segment is not
    /// base64, the payload is not JSON, or the `exp` claim is missing.
    pub fn decode(token: &str) -> AppResult<Self> {
        let segment = token
            .split('.')
            .nth(1)
            .map(|value| value.trim_end_matches('='))
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                AppError::InvalidPayload("access token has no payload segment".to_owned())
            })?;

        let bytes = URL_SAFE_NO_PAD
            .decode(segment)
            .or_else(|_| STANDARD_NO_PAD.decode(segment))
            .map_err(|error| {
                AppError::InvalidPayload(format!("access token payload is not base64: {error}"))
            })?;

        let claims = serde_json::from_slice::<WireClaims>(&bytes).map_err(|error| {
            AppError::InvalidPayload(format!("access token payload is not JSON: {error}"))
        })?;

        let expires_at_seconds = claims
            .exp
            .filter(|value| value.is_finite())
            .ok_or_else(|| {
                AppError::InvalidPayload("access token has no numeric exp claim".to_owned())
            })?;

        Ok(Self {
            expires_at_seconds,
            subject: claims.sub,
        })
    }

    /// Returns the `sub` claim, if present.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Returns the expiry as a timestamp when it fits the calendar range.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis((self.expires_at_seconds * 1000.0) as i64)
    }

    /// Returns whether the token expired strictly before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at_seconds * 1000.0 < now.timestamp_millis() as f64
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::{TimeZone, Utc};

    use super::{TokenPair, UnverifiedAccessClaims};

    fn token_with_payload(payload: &serde_json::Value) -> String {
        format!(
            "eyJhbGciOiJIUzI1NiJ9.{}.signature",
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }

    #[test]
    fn decodes_expiry_and_subject() {
        let token = token_with_payload(&serde_json::json!({"sub": "u-1", "exp": 4_102_444_800_i64}));
        let claims = UnverifiedAccessClaims::decode(&token)
            .unwrap_or_else(|error| panic!("claims should decode: {error}"));

        assert_eq!(claims.subject(), Some("u-1"));
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).single();
        assert!(now.is_some_and(|now| !claims.is_expired_at(now)));
    }

    #[test]
    fn past_expiry_is_expired() {
        let token = token_with_payload(&serde_json::json!({"exp": 946_684_800_i64}));
        let claims = UnverifiedAccessClaims::decode(&token)
            .unwrap_or_else(|error| panic!("claims should decode: {error}"));
        assert!(claims.is_expired_at(Utc::now()));
    }

    #[test]
    fn missing_exp_is_rejected() {
        let token = token_with_payload(&serde_json::json!({"sub": "u-1"}));
        assert!(UnverifiedAccessClaims::decode(&token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(UnverifiedAccessClaims::decode("not-a-jwt").is_err());
        assert!(UnverifiedAccessClaims::decode("a.%%%.c").is_err());
        assert!(UnverifiedAccessClaims::decode("a..c").is_err());
    }

    #[test]
    fn token_pair_requires_both_tokens() {
        assert!(TokenPair::new("access", "").is_err());
        assert!(TokenPair::new("", "refresh").is_err());
        assert!(TokenPair::new("access", "refresh").is_ok());
    }

    #[test]
    fn token_pair_decodes_camel_case_and_rejects_blank() {
        let pair: Result<TokenPair, _> = serde_json::from_value(serde_json::json!({
            "accessToken": "a",
            "refreshToken": "r"
        }));
        assert!(pair.is_ok());

        let blank: Result<TokenPair, _> = serde_json::from_value(serde_json::json!({
            "accessToken": "a",
            "refreshToken": ""
        }));
        assert!(blank.is_err());
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let pair = TokenPair::new("secret-access", "secret-refresh")
            .unwrap_or_else(|error| panic!("{error}"));
        let rendered = format!("{pair:?}");
        assert!(!rendered.contains("secret"));
    }
}
