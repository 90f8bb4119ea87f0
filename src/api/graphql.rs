use serde::Serialize;
use serde_json::Value;

use super::error::{ApiError, Result};

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: &'a Value,
}

/// GraphQL-over-HTTP client. Attaches the bearer when a user is loaded
/// and leaves requests unauthenticated otherwise.
pub struct GraphqlClient {
    http: reqwest::Client,
    url: String,
    bearer: Option<String>,
}

impl GraphqlClient {
    pub fn new(url: String, bearer: Option<String>) -> Self {
        GraphqlClient {
            http: reqwest::Client::new(),
            url,
            bearer,
        }
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    /// Execute one operation and return its `data`. Server-reported
    /// errors are mapped through `ApiError::from_server_message`.
    pub async fn query(&self, query: &str, variables: Value) -> Result<Value> {
        let mut request = self.http.post(&self.url).json(&GraphqlRequest {
            query,
            variables: &variables,
        });
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Server(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let envelope: Value = serde_json::from_str(&body)?;
        if let Some(message) = first_error_message(&envelope) {
            return Err(ApiError::from_server_message(&message));
        }

        envelope
            .get("data")
            .cloned()
            .ok_or_else(|| ApiError::Shape(format!("no data in response: {}", body)))
    }
}

fn first_error_message(envelope: &Value) -> Option<String> {
    envelope
        .get("errors")?
        .as_array()?
        .first()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_error_message() {
        let envelope: Value = serde_json::from_str(
            r#"{"data":null,"errors":[{"message":"access denied"},{"message":"second"}]}"#,
        )
        .unwrap();
        assert_eq!(first_error_message(&envelope).as_deref(), Some("access denied"));
    }

    #[test]
    fn no_errors_yields_none() {
        let envelope: Value = serde_json::from_str(r#"{"data":{"app":{"id":"1"}}}"#).unwrap();
        assert!(first_error_message(&envelope).is_none());
    }

    #[test]
    fn empty_error_array_yields_none() {
        let envelope: Value = serde_json::from_str(r#"{"data":null,"errors":[]}"#).unwrap();
        assert!(first_error_message(&envelope).is_none());
    }
}
