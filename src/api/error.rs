use thiserror::Error;

/// Error returned by a deploy-event handler. Terminates the subscription
/// and surfaces through `ApiError::EventHandler`.
pub type EventHandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from the platform API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Access denied")]
    AccessDenied,

    #[error("App not found")]
    AppNotFound,

    #[error("{0}")]
    Server(String),

    #[error("Upload failed with HTTP {status} for {url}: {body}")]
    UploadFailed {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Unexpected response shape: {0}")]
    Shape(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Network(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("{0}")]
    EventHandler(EventHandlerError),

    #[error("The operation was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Map a GraphQL error message onto the typed errors callers branch
    /// on; anything unrecognized keeps the server's wording.
    pub fn from_server_message(message: &str) -> Self {
        let lowered = message.to_lowercase();
        if lowered.contains("access denied") {
            ApiError::AccessDenied
        } else if lowered.contains("app not found") {
            ApiError::AppNotFound
        } else {
            ApiError::Server(message.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_denied_is_mapped() {
        assert!(matches!(
            ApiError::from_server_message("access denied for user"),
            ApiError::AccessDenied
        ));
    }

    #[test]
    fn app_not_found_is_mapped() {
        assert!(matches!(
            ApiError::from_server_message("app not found: acme/my-app"),
            ApiError::AppNotFound
        ));
    }

    #[test]
    fn other_messages_are_preserved() {
        match ApiError::from_server_message("quota exceeded") {
            ApiError::Server(message) => assert_eq!(message, "quota exceeded"),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
