use anyhow::{Result, bail};
use std::time::{Duration, Instant};

/// Tokens this close to expiry are refreshed before use.
pub(crate) const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Google access tokens last an hour unless the endpoint says otherwise.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, serde::Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    #[serde(default)]
    pub(crate) expires_in: Option<u64>,
    #[serde(default)]
    pub(crate) token_type: Option<String>,
}

#[derive(Clone)]
pub(crate) struct AccessToken {
    pub(crate) value: String,
    pub(crate) expires_at: Instant,
}

impl AccessToken {
    pub(crate) fn from_response(resp: TokenResponse, issued_at: Instant) -> Result<Self> {
        if resp.access_token.trim().is_empty() {
            bail!("token endpoint returned an empty access_token");
        }
        if let Some(kind) = resp.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                bail!("unsupported token_type `{}` (expected Bearer)", kind);
            }
        }
        let lifetime = resp
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LIFETIME);
        let Some(expires_at) = issued_at.checked_add(lifetime) else {
            bail!(
                "token endpoint returned an out-of-range expires_in ({} s)",
                lifetime.as_secs()
            );
        };
        Ok(Self {
            value: resp.access_token,
            expires_at,
        })
    }

    pub(crate) fn is_fresh(&self, now: Instant) -> bool {
        now + EXPIRY_MARGIN < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> TokenResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn token_is_fresh_until_margin() {
        let now = Instant::now();
        let token = AccessToken::from_response(
            response(r#"{"access_token":"ya29.x","expires_in":3599,"token_type":"Bearer"}"#),
            now,
        )
        .unwrap();
        assert!(token.is_fresh(now));
        assert!(token.is_fresh(now + Duration::from_secs(3500)));
        assert!(!token.is_fresh(now + Duration::from_secs(3540)));
    }

    #[test]
    fn short_lived_token_is_never_fresh() {
        let now = Instant::now();
        let token = AccessToken::from_response(
            response(r#"{"access_token":"ya29.x","expires_in":30}"#),
            now,
        )
        .unwrap();
        assert!(!token.is_fresh(now));
    }

    #[test]
    fn missing_expiry_defaults_to_an_hour() {
        let now = Instant::now();
        let token =
            AccessToken::from_response(response(r#"{"access_token":"ya29.x"}"#), now).unwrap();
        assert_eq!(token.expires_at, now + DEFAULT_LIFETIME);
    }

    #[test]
    fn overflowing_expiry_is_an_error() {
        let now = Instant::now();
        let err = AccessToken::from_response(
            response(r#"{"access_token":"x","expires_in":18446744073709551615}"#),
            now,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("out-of-range expires_in"));
    }

    #[test]
    fn rejects_empty_or_non_bearer_tokens() {
        let now = Instant::now();
        assert!(AccessToken::from_response(response(r#"{"access_token":""}"#), now).is_err());
        assert!(
            AccessToken::from_response(
                response(r#"{"access_token":"x","token_type":"MAC"}"#),
                now
            )
            .is_err()
        );
    }
}
