use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::api::{self, AppService, GraphqlAppService, GraphqlClient};
use crate::app_ident::resolve_identifier;
use crate::auth::Authenticator;
use crate::config::{Manifest, SavedConfig};
use crate::errors::report;
use crate::output;
use crate::store::CredentialStore;

#[derive(Debug, Clone, Default)]
pub struct LogsArgs {
    pub app_dir: PathBuf,
    pub organization: Option<String>,
    pub app: Option<String>,
    pub tail: Option<u32>,
}

pub async fn run(args: LogsArgs, cancel: &CancellationToken) -> Result<(), Box<dyn std::error::Error>> {
    let store = CredentialStore::select();
    let auth = Authenticator::new(store);
    let user = match auth.ensure_logged_in().await {
        Ok(user) => user,
        Err(err) => return Err(report(&err.to_string())),
    };

    let manifest = Manifest::load_from_dir(&args.app_dir).ok();
    let ident = match resolve_identifier(
        manifest.as_ref(),
        args.organization.as_deref(),
        args.app.as_deref(),
        &SavedConfig::load(),
    ) {
        Ok(ident) => ident,
        Err(err) => return Err(report(&err.to_string())),
    };

    let graphql = GraphqlClient::new(api::graphql_http_url(), Some(user.access_token));
    let service = GraphqlAppService::new(graphql, api::graphql_ws_url());

    output::step(&format!(
        "Streaming logs for {} in {} (Ctrl+c to stop)",
        output::emphasized(&ident.app),
        output::emphasized(&ident.organization)
    ));

    let mut logs = service
        .app_deploy_logs(&ident.organization, &ident.app, args.tail, true, cancel)
        .await
        .map_err(|err| report(&err.to_string()))?;

    while let Some(entry) = logs.recv().await {
        println!("{} {}", entry.timestamp.format("%Y-%m-%dT%H:%M:%S"), entry.text);
    }

    Ok(())
}
