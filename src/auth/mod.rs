//! Authentication against the platform's OAuth tenant: device-code
//! login, token refresh and revocation, and the logged-in-user gate.

mod error;
mod user;

use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

pub use error::{AuthError, Result};
pub use user::{AuthStatus, Claims, User, parse_claims};

use crate::store::CredentialStore;

/// Bearer that supersedes any stored credential.
pub const ACCESS_TOKEN_ENV: &str = "NUMEROUS_ACCESS_TOKEN";

const DEFAULT_TENANT: &str = "numerous.eu.auth0.com";
const CLIENT_ID: &str = "tGiQYKLQVgUgkzLO3aJXXhRHtI5wWEtb";
const AUDIENCE: &str = "https://api.numerous.com";

const SCOPE: &str = "openid profile offline_access email";
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Extra slack on top of the server-requested poll interval.
const POLL_SLACK: Duration = Duration::from_secs(3);

/// Server response to a device-code request.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri_complete: String,
    pub expires_in: u64,
    pub interval: u64,
}

/// Token set handed out when the device flow completes.
#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// State-free authenticator bound to one tenant/client/audience triple.
pub struct Authenticator {
    tenant: String,
    client_id: String,
    audience: String,
    http: reqwest::Client,
    store: CredentialStore,
}

impl Authenticator {
    pub fn new(store: CredentialStore) -> Self {
        Authenticator {
            tenant: DEFAULT_TENANT.to_string(),
            client_id: CLIENT_ID.to_string(),
            audience: AUDIENCE.to_string(),
            http: reqwest::Client::new(),
            store,
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    fn device_code_url(&self) -> String {
        format!("https://{}/oauth/device/code", self.tenant)
    }

    fn token_url(&self) -> String {
        format!("https://{}/oauth/token", self.tenant)
    }

    fn revoke_url(&self) -> String {
        format!("https://{}/oauth/revoke", self.tenant)
    }

    /// Kick off the device-code flow.
    pub async fn start_device_flow(&self) -> Result<DeviceCode> {
        let response = self
            .http
            .post(self.device_code_url())
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", SCOPE),
                ("audience", self.audience.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Poll the token endpoint until the user approves, the server
    /// rejects, or the ambient context is cancelled.
    pub async fn poll_for_tokens(
        &self,
        device_code: &DeviceCode,
        cancel: &CancellationToken,
    ) -> Result<TokenResponse> {
        let interval = Duration::from_secs(device_code.interval) + POLL_SLACK;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }

            let body = self
                .http
                .post(self.token_url())
                .form(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("client_id", self.client_id.as_str()),
                    ("device_code", device_code.device_code.as_str()),
                ])
                .send()
                .await?
                .text()
                .await?;

            let parsed: TokenEndpointResponse = serde_json::from_str(&body)?;
            match interpret_poll_response(parsed)? {
                Some(tokens) => return Ok(tokens),
                None => continue,
            }
        }
    }

    /// Exchange the refresh token for a fresh access token.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String> {
        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenEndpointResponse = serde_json::from_str(&body)?;
        parsed
            .access_token
            .ok_or_else(|| AuthError::Unexpected(format!("no access token in response: {}", body)))
    }

    /// Revoke a refresh token. Used on logout; best effort by callers.
    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<()> {
        let response = self
            .http
            .post(self.revoke_url())
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("token", refresh_token),
            ])
            .send()
            .await?;

        match response.status().as_u16() {
            200 => Ok(()),
            400 => Err(AuthError::RevokeInvalidRequest),
            401 => Err(AuthError::RevokeInvalidClient),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AuthError::Unexpected(format!("HTTP {}: {}", status, body)))
            }
        }
    }

    /// The current user: the env bearer when set, otherwise whatever the
    /// credential store holds. `UserNotLoggedIn` when neither exists.
    pub fn current_user(&self) -> Result<User> {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV)
            && !token.is_empty()
        {
            return Ok(User {
                access_token: token,
                refresh_token: None,
                tenant: self.tenant.clone(),
            });
        }

        let credentials = self
            .store
            .get(&self.tenant)?
            .ok_or(AuthError::UserNotLoggedIn)?;
        Ok(User {
            access_token: credentials.access,
            refresh_token: credentials.refresh,
            tenant: self.tenant.clone(),
        })
    }

    /// Auth gate for commands that need the platform: validates the
    /// stored token and refreshes it exactly once when expired.
    pub async fn ensure_logged_in(&self) -> Result<User> {
        let mut user = self.current_user()?;

        // An env-provided bearer is taken at face value.
        if std::env::var(ACCESS_TOKEN_ENV).is_ok_and(|t| !t.is_empty()) {
            return Ok(user);
        }

        match user.check()? {
            AuthStatus::Valid => Ok(user),
            AuthStatus::Expired => {
                let Some(refresh_token) = user.refresh_token.clone() else {
                    return Err(AuthError::ExpiredToken);
                };
                let access = self.refresh_access_token(&refresh_token).await?;
                self.store.store_access(&self.tenant, &access)?;
                user.access_token = access;
                Ok(user)
            }
        }
    }
}

/// Decide what a single poll response means: `Ok(Some(..))` when login
/// completed, `Ok(None)` to keep polling, `Err(..)` to stop.
fn interpret_poll_response(response: TokenEndpointResponse) -> Result<Option<TokenResponse>> {
    if let Some(error) = response.error.as_deref() {
        let description = response.error_description.unwrap_or_default();
        return match error {
            "authorization_pending" | "slow_down" => Ok(None),
            "access_denied" if description.contains("email not verified") => {
                Err(AuthError::EmailNotVerified)
            }
            _ => Err(AuthError::LoginFailed(description)),
        };
    }

    let (Some(access_token), Some(refresh_token), Some(expires_in)) = (
        response.access_token,
        response.refresh_token,
        response.expires_in,
    ) else {
        return Err(AuthError::Unexpected(
            "token response is missing fields".to_string(),
        ));
    };

    // The access token must be a well-formed JWT before it is stored.
    parse_claims(&access_token)?;

    Ok(Some(TokenResponse {
        access_token,
        refresh_token,
        expires_at: chrono::Utc::now() + chrono::Duration::seconds(expires_in as i64),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll_response(json: &str) -> TokenEndpointResponse {
        serde_json::from_str(json).expect("test JSON should parse")
    }

    #[test]
    fn pending_keeps_polling() {
        let outcome = interpret_poll_response(poll_response(
            r#"{"error":"authorization_pending","error_description":"pending"}"#,
        ))
        .expect("pending is not an error");
        assert!(outcome.is_none());
    }

    #[test]
    fn unverified_email_is_its_own_error() {
        let err = interpret_poll_response(poll_response(
            r#"{"error":"access_denied","error_description":"email not verified yet"}"#,
        ))
        .expect_err("should fail");
        assert!(matches!(err, AuthError::EmailNotVerified));
    }

    #[test]
    fn other_errors_carry_the_server_description() {
        let err = interpret_poll_response(poll_response(
            r#"{"error":"expired_token","error_description":"the device code expired"}"#,
        ))
        .expect_err("should fail");
        match err {
            AuthError::LoginFailed(description) => {
                assert_eq!(description, "the device code expired")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn success_requires_a_parseable_jwt() {
        let err = interpret_poll_response(poll_response(
            r#"{"access_token":"garbage","refresh_token":"r","expires_in":3600}"#,
        ))
        .expect_err("garbage token should fail");
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[test]
    fn success_surfaces_expiry() {
        let token = user::unsigned_token("https://numerous.example.com/", 2_000_000_000);
        let response = TokenEndpointResponse {
            access_token: Some(token.clone()),
            refresh_token: Some("refresh".to_string()),
            expires_in: Some(3600),
            error: None,
            error_description: None,
        };
        let tokens = interpret_poll_response(response)
            .expect("should succeed")
            .expect("should be complete");
        assert_eq!(tokens.access_token, token);
        assert!(tokens.expires_at > chrono::Utc::now());
    }

    #[test]
    fn missing_fields_are_unexpected() {
        let err = interpret_poll_response(poll_response(r#"{"access_token":"only"}"#))
            .expect_err("should fail");
        assert!(matches!(err, AuthError::Unexpected(_)));
    }
}
