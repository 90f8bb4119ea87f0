use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::{ApiError, EventHandlerError, Result};
use super::graphql::GraphqlClient;
use super::subscription;

/// Server-pushed deploy event, decoded from the `__typename` union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployEvent {
    BuildMessage { message: String },
    BuildError { message: String },
    StatusChanged { status: String },
}

/// One line of runtime logs from a deployed app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// Decode a deploy event object. Unknown `__typename` values return
/// `None` and must be ignored by callers (forward compatibility).
pub fn decode_deploy_event(event: &Value) -> Option<DeployEvent> {
    let typename = event.get("__typename")?.as_str()?;
    let field = |name: &str| {
        event
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    match typename {
        "AppBuildMessageEvent" => Some(DeployEvent::BuildMessage {
            message: field("message"),
        }),
        "AppBuildErrorEvent" => Some(DeployEvent::BuildError {
            message: field("message"),
        }),
        "AppDeploymentStatusEvent" => Some(DeployEvent::StatusChanged {
            status: field("status"),
        }),
        _ => None,
    }
}

/// Typed operations against the platform. The orchestrator depends on
/// this trait so tests can drive it with a double.
#[async_trait]
pub trait AppService: Send + Sync {
    async fn read_app(&self, organization: &str, app: &str) -> Result<String>;

    async fn create_app(
        &self,
        organization: &str,
        app: &str,
        display_name: &str,
        description: &str,
    ) -> Result<String>;

    async fn create_version(
        &self,
        app_id: &str,
        version: Option<&str>,
        message: Option<&str>,
    ) -> Result<String>;

    async fn app_version_upload_url(&self, app_version_id: &str) -> Result<String>;

    async fn upload_app_source(&self, url: &str, archive: &Path, size: u64) -> Result<()>;

    async fn deploy_app(
        &self,
        app_version_id: &str,
        secrets: &HashMap<String, String>,
    ) -> Result<String>;

    /// Stream deploy events in server order. A handler error terminates
    /// the subscription and surfaces as `ApiError::EventHandler`.
    async fn deploy_events(
        &self,
        deployment_version_id: &str,
        cancel: &CancellationToken,
        handler: &mut (dyn FnMut(DeployEvent) -> std::result::Result<(), EventHandlerError>
                  + Send),
    ) -> Result<()>;

    /// Tail runtime logs. The channel closes when the server ends the
    /// stream or the ambient context is cancelled; entries already
    /// received are drained before the consumer observes the close.
    async fn app_deploy_logs(
        &self,
        organization: &str,
        app: &str,
        tail: Option<u32>,
        follow: bool,
        cancel: &CancellationToken,
    ) -> Result<mpsc::UnboundedReceiver<LogEntry>>;
}

const READ_APP: &str = r#"
query CLIReadApp($orgSlug: String!, $appSlug: String!) {
  app(organizationSlug: $orgSlug, appSlug: $appSlug) {
    id
  }
}
"#;

const CREATE_APP: &str = r#"
mutation CLIAppCreate($orgSlug: String!, $appSlug: String!, $displayName: String!, $description: String!) {
  appCreate(organizationSlug: $orgSlug, input: {appSlug: $appSlug, displayName: $displayName, description: $description}) {
    id
  }
}
"#;

const CREATE_VERSION: &str = r#"
mutation CLIAppVersionCreate($appID: ID!, $version: String, $message: String) {
  appVersionCreate(appID: $appID, input: {version: $version, message: $message}) {
    id
  }
}
"#;

const UPLOAD_URL: &str = r#"
query CLIAppVersionUploadURL($appVersionID: ID!) {
  appVersionUploadURL(appVersionID: $appVersionID) {
    url
  }
}
"#;

const DEPLOY_APP: &str = r#"
mutation CLIAppDeploy($appVersionID: ID!, $secrets: [AppSecret!]) {
  appDeploy(appVersionID: $appVersionID, input: {secrets: $secrets}) {
    id
  }
}
"#;

const DEPLOY_EVENTS: &str = r#"
subscription CLIAppDeployEvents($deploymentVersionID: ID!) {
  appDeployEvents(deploymentVersionID: $deploymentVersionID) {
    __typename
    ... on AppBuildMessageEvent {
      message
    }
    ... on AppBuildErrorEvent {
      message
    }
    ... on AppDeploymentStatusEvent {
      status
    }
  }
}
"#;

const DEPLOY_LOGS: &str = r#"
subscription CLIAppDeployLogs($orgSlug: String!, $appSlug: String!, $tail: Int, $follow: Boolean!) {
  appDeployLogs(organizationSlug: $orgSlug, appSlug: $appSlug, tail: $tail, follow: $follow) {
    timestamp
    text
  }
}
"#;

/// The real App Service: GraphQL over HTTP plus WebSocket subscriptions.
pub struct GraphqlAppService {
    graphql: GraphqlClient,
    ws_url: String,
    http: reqwest::Client,
}

impl GraphqlAppService {
    pub fn new(graphql: GraphqlClient, ws_url: String) -> Self {
        GraphqlAppService {
            graphql,
            ws_url,
            http: reqwest::Client::new(),
        }
    }

    fn id_from(data: Value, pointer: &str) -> Result<String> {
        data.pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::Shape(format!("missing {} in response", pointer)))
    }
}

#[async_trait]
impl AppService for GraphqlAppService {
    async fn read_app(&self, organization: &str, app: &str) -> Result<String> {
        let data = self
            .graphql
            .query(READ_APP, json!({ "orgSlug": organization, "appSlug": app }))
            .await?;
        Self::id_from(data, "/app/id")
    }

    async fn create_app(
        &self,
        organization: &str,
        app: &str,
        display_name: &str,
        description: &str,
    ) -> Result<String> {
        let data = self
            .graphql
            .query(
                CREATE_APP,
                json!({
                    "orgSlug": organization,
                    "appSlug": app,
                    "displayName": display_name,
                    "description": description,
                }),
            )
            .await?;
        Self::id_from(data, "/appCreate/id")
    }

    async fn create_version(
        &self,
        app_id: &str,
        version: Option<&str>,
        message: Option<&str>,
    ) -> Result<String> {
        let data = self
            .graphql
            .query(
                CREATE_VERSION,
                json!({ "appID": app_id, "version": version, "message": message }),
            )
            .await?;
        Self::id_from(data, "/appVersionCreate/id")
    }

    async fn app_version_upload_url(&self, app_version_id: &str) -> Result<String> {
        let data = self
            .graphql
            .query(UPLOAD_URL, json!({ "appVersionID": app_version_id }))
            .await?;
        Self::id_from(data, "/appVersionUploadURL/url")
    }

    /// `PUT` the archive to the pre-signed URL. The ticket is single-use;
    /// this is never retried, and any non-200 answer is an upload error
    /// carrying the verbatim response body.
    async fn upload_app_source(&self, url: &str, archive: &Path, size: u64) -> Result<()> {
        let file = tokio::fs::File::open(archive).await?;
        let body = reqwest::Body::wrap_stream(tokio_util::io::ReaderStream::new(file));

        let response = self
            .http
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/tar")
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::UploadFailed {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        Ok(())
    }

    async fn deploy_app(
        &self,
        app_version_id: &str,
        secrets: &HashMap<String, String>,
    ) -> Result<String> {
        let mut wire_secrets: Vec<Value> = secrets
            .iter()
            .map(|(name, value)| {
                json!({ "name": name, "base64Value": BASE64.encode(value.as_bytes()) })
            })
            .collect();
        wire_secrets.sort_by_key(|s| s["name"].as_str().map(str::to_string));

        let data = self
            .graphql
            .query(
                DEPLOY_APP,
                json!({ "appVersionID": app_version_id, "secrets": wire_secrets }),
            )
            .await?;
        Self::id_from(data, "/appDeploy/id")
    }

    async fn deploy_events(
        &self,
        deployment_version_id: &str,
        cancel: &CancellationToken,
        handler: &mut (dyn FnMut(DeployEvent) -> std::result::Result<(), EventHandlerError>
                  + Send),
    ) -> Result<()> {
        subscription::subscribe(
            &self.ws_url,
            self.graphql.bearer(),
            DEPLOY_EVENTS,
            json!({ "deploymentVersionID": deployment_version_id }),
            cancel,
            |data| {
                let Some(event) = data.get("appDeployEvents").and_then(|e| decode_deploy_event(e))
                else {
                    // Unknown variants are skipped without ending the stream.
                    return Ok(());
                };
                handler(event)
            },
        )
        .await
    }

    async fn app_deploy_logs(
        &self,
        organization: &str,
        app: &str,
        tail: Option<u32>,
        follow: bool,
        cancel: &CancellationToken,
    ) -> Result<mpsc::UnboundedReceiver<LogEntry>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let ws_url = self.ws_url.clone();
        let bearer = self.graphql.bearer().map(str::to_string);
        let variables = json!({
            "orgSlug": organization,
            "appSlug": app,
            "tail": tail,
            "follow": follow,
        });
        let cancel = cancel.clone();

        tokio::spawn(async move {
            let result = subscription::subscribe(
                &ws_url,
                bearer.as_deref(),
                DEPLOY_LOGS,
                variables,
                &cancel,
                |data| {
                    if let Some(entry) = decode_log_entry(data) {
                        sender
                            .send(entry)
                            .map_err(|e| Box::new(e) as EventHandlerError)?;
                    }
                    Ok(())
                },
            )
            .await;

            match result {
                Ok(()) | Err(ApiError::Cancelled) => {}
                Err(err) => tracing::debug!(error = %err, "log subscription ended"),
            }
            // Sender drops here; the receiver drains buffered entries and
            // then observes the close.
        });

        Ok(receiver)
    }
}

fn decode_log_entry(data: &Value) -> Option<LogEntry> {
    let entry = data.get("appDeployLogs")?;
    let text = entry.get("text")?.as_str()?.to_string();
    let timestamp = entry
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    Some(LogEntry { timestamp, text })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_all_three_event_variants() {
        let message = json!({ "__typename": "AppBuildMessageEvent", "message": "step 1" });
        assert_eq!(
            decode_deploy_event(&message),
            Some(DeployEvent::BuildMessage {
                message: "step 1".to_string()
            })
        );

        let error = json!({ "__typename": "AppBuildErrorEvent", "message": "boom" });
        assert_eq!(
            decode_deploy_event(&error),
            Some(DeployEvent::BuildError {
                message: "boom".to_string()
            })
        );

        let status = json!({ "__typename": "AppDeploymentStatusEvent", "status": "RUNNING" });
        assert_eq!(
            decode_deploy_event(&status),
            Some(DeployEvent::StatusChanged {
                status: "RUNNING".to_string()
            })
        );
    }

    #[test]
    fn unknown_typename_is_ignored() {
        let unknown = json!({ "__typename": "AppSomethingNewEvent", "message": "?" });
        assert_eq!(decode_deploy_event(&unknown), None);

        let missing = json!({ "message": "no typename" });
        assert_eq!(decode_deploy_event(&missing), None);
    }

    #[test]
    fn decodes_log_entries_with_rfc3339_timestamps() {
        let data = json!({
            "appDeployLogs": { "timestamp": "2024-05-01T12:00:00Z", "text": "ready" }
        });
        let entry = decode_log_entry(&data).expect("entry should decode");
        assert_eq!(entry.text, "ready");
        assert_eq!(entry.timestamp.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn log_entry_without_text_is_skipped() {
        let data = json!({ "appDeployLogs": { "timestamp": "2024-05-01T12:00:00Z" } });
        assert!(decode_log_entry(&data).is_none());
    }
}
