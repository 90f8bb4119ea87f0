use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use super::error::{AuthError, Result};

/// Claims the CLI inspects. Signature verification is the platform's
/// job; client-side we only read issuer and expiry.
#[derive(Debug, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// A logged-in user: the bearer token pair plus the tenant it belongs to.
#[derive(Debug, Clone)]
pub struct User {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub tenant: String,
}

/// Outcome of inspecting a stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Valid,
    Expired,
}

pub fn parse_claims(token: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|_| AuthError::InvalidToken)?;
    Ok(data.claims)
}

impl User {
    /// Validate the stored access token: it must parse, carry the
    /// tenant's issuer, and not be past its expiry.
    pub fn check(&self) -> Result<AuthStatus> {
        if self.access_token.is_empty() {
            return Err(AuthError::UserNotLoggedIn);
        }

        let claims = parse_claims(&self.access_token)?;

        let expected_issuer = format!("https://{}/", self.tenant);
        if claims.iss.as_deref() != Some(expected_issuer.as_str()) {
            return Err(AuthError::InvalidToken);
        }

        match claims.exp {
            Some(exp) if exp > Utc::now().timestamp() => Ok(AuthStatus::Valid),
            _ => Ok(AuthStatus::Expired),
        }
    }
}

#[cfg(test)]
pub(crate) fn unsigned_token(iss: &str, exp: i64) -> String {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "iss": iss, "exp": exp, "sub": "user@example.com" }).to_string(),
    );
    // The signature is never checked client-side, any bytes will do.
    let signature = URL_SAFE_NO_PAD.encode(b"sig");
    format!("{}.{}.{}", header, payload, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TENANT: &str = "numerous.example.com";

    fn user_with(token: String) -> User {
        User {
            access_token: token,
            refresh_token: None,
            tenant: TENANT.to_string(),
        }
    }

    #[test]
    fn valid_token_passes() {
        let exp = Utc::now().timestamp() + 3600;
        let user = user_with(unsigned_token(&format!("https://{}/", TENANT), exp));
        assert_eq!(user.check().unwrap(), AuthStatus::Valid);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let exp = Utc::now().timestamp() - 60;
        let user = user_with(unsigned_token(&format!("https://{}/", TENANT), exp));
        assert_eq!(user.check().unwrap(), AuthStatus::Expired);
    }

    #[test]
    fn issuer_mismatch_is_invalid() {
        let exp = Utc::now().timestamp() + 3600;
        let user = user_with(unsigned_token("https://elsewhere.example.com/", exp));
        assert!(matches!(user.check(), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let user = user_with("not-a-jwt".to_string());
        assert!(matches!(user.check(), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn empty_token_is_not_logged_in() {
        let user = user_with(String::new());
        assert!(matches!(user.check(), Err(AuthError::UserNotLoggedIn)));
    }
}
