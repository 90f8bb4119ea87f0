use thiserror::Error;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("You are not logged in. Run 'numerous login' first.")]
    UserNotLoggedIn,

    #[error("The stored access token is not valid. Log in again with 'numerous login'.")]
    InvalidToken,

    #[error("The stored access token has expired.")]
    ExpiredToken,

    #[error("Your account email is not verified. Verify it and log in again.")]
    EmailNotVerified,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("The revocation request was malformed")]
    RevokeInvalidRequest,

    #[error("The revocation request used an unknown client")]
    RevokeInvalidClient,

    #[error("Unexpected response from the authentication server: {0}")]
    Unexpected(String),

    #[error("Login was cancelled")]
    Cancelled,

    #[error("Failed to decode authentication response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

pub type Result<T> = std::result::Result<T, AuthError>;
