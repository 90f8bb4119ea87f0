//! Transport against the platform: GraphQL over HTTP, subscriptions
//! over WebSocket, and the pre-signed source upload.

mod app;
mod error;
mod graphql;
mod subscription;

pub use app::{
    AppService, DeployEvent, GraphqlAppService, LogEntry, decode_deploy_event,
};
pub use error::{ApiError, EventHandlerError, Result};
pub use graphql::GraphqlClient;

pub const GRAPHQL_HTTP_URL_ENV: &str = "NUMEROUS_GRAPHQL_HTTP_URL";
pub const GRAPHQL_WS_URL_ENV: &str = "NUMEROUS_GRAPHQL_WS_URL";

const DEFAULT_GRAPHQL_HTTP_URL: &str = "https://api.numerous.com/query";

/// The GraphQL HTTP endpoint, overridable via env.
pub fn graphql_http_url() -> String {
    match std::env::var(GRAPHQL_HTTP_URL_ENV) {
        Ok(url) if !url.is_empty() => url,
        _ => DEFAULT_GRAPHQL_HTTP_URL.to_string(),
    }
}

/// The GraphQL WebSocket endpoint: explicit env override, otherwise the
/// HTTP endpoint with the scheme swapped.
pub fn graphql_ws_url() -> String {
    match std::env::var(GRAPHQL_WS_URL_ENV) {
        Ok(url) if !url.is_empty() => url,
        _ => http_to_ws(&graphql_http_url()),
    }
}

fn http_to_ws(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_swap_covers_both_schemes() {
        assert_eq!(http_to_ws("https://api.example.com/query"), "wss://api.example.com/query");
        assert_eq!(http_to_ws("http://localhost:8080/query"), "ws://localhost:8080/query");
        assert_eq!(http_to_ws("wss://already.example.com"), "wss://already.example.com");
    }
}
