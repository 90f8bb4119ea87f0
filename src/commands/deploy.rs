use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::api::{self, ApiError, AppService, DeployEvent, GraphqlAppService, GraphqlClient};
use crate::app_ident::{AppIdentifier, resolve_identifier};
use crate::archive::{format_size, tar_create};
use crate::auth::Authenticator;
use crate::config::{Manifest, SavedConfig, read_secrets};
use crate::errors::report;
use crate::output;
use crate::store::CredentialStore;

/// Hard cap on the source archive; the platform rejects larger uploads.
pub const MAX_ARCHIVE_BYTES: u64 = 5 * 1024 * 1024 * 1024;

const ARCHIVE_PREFIX: &str = ".numerous-upload-";

/// Deploy arguments as they arrive from the CLI surface.
#[derive(Debug, Clone, Default)]
pub struct DeployArgs {
    pub app_dir: PathBuf,
    pub project_dir: Option<PathBuf>,
    pub organization: Option<String>,
    pub app: Option<String>,
    pub version: Option<String>,
    pub message: Option<String>,
    pub verbose: bool,
    pub follow: bool,
}

/// Terminal pipeline failures raised from inside the event handler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeployFailure {
    #[error("Build failed: {message}")]
    BuildFailed { message: String },

    #[error("Deploy failed with status {status}")]
    StatusFailed { status: String },
}

pub async fn run(args: DeployArgs, cancel: &CancellationToken) -> Result<(), Box<dyn std::error::Error>> {
    let store = CredentialStore::select();
    let auth = Authenticator::new(store);
    let user = match auth.ensure_logged_in().await {
        Ok(user) => user,
        Err(err) => return Err(report(&err.to_string())),
    };

    let graphql = GraphqlClient::new(api::graphql_http_url(), Some(user.access_token));
    let service = GraphqlAppService::new(graphql, api::graphql_ws_url());
    run_with_service(&args, &service, cancel).await
}

/// The deploy pipeline:
///
/// ```text
/// LOAD -> REGISTER -> ARCHIVE -> UPLOAD -> DEPLOY -> EVENTS -> [FOLLOW]
/// ```
///
/// The service seam exists so tests can drive the pipeline with a double.
pub async fn run_with_service(
    args: &DeployArgs,
    service: &dyn AppService,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    // ===== LOAD =====
    let manifest = match Manifest::load_from_dir(&args.app_dir) {
        Ok(manifest) => Some(manifest),
        Err(crate::config::ConfigError::AppNotInitialized) => None,
        Err(err) => return Err(report(&err.to_string())),
    };

    let ident = match resolve_identifier(
        manifest.as_ref(),
        args.organization.as_deref(),
        args.app.as_deref(),
        &SavedConfig::load(),
    ) {
        Ok(ident) => ident,
        Err(err) => return Err(report(&err.to_string())),
    };

    let secrets = read_secrets(&args.app_dir);
    let manifest = manifest.unwrap_or_default();

    output::section("Deploy");
    output::step(&format!(
        "Deploying {} to organization {}",
        output::emphasized(&ident.app),
        output::emphasized(&ident.organization)
    ));

    // ===== REGISTER =====
    let app_id = match service.read_app(&ident.organization, &ident.app).await {
        Ok(app_id) => app_id,
        Err(ApiError::AppNotFound) => {
            let app_id = service
                .create_app(
                    &ident.organization,
                    &ident.app,
                    manifest.display_name(),
                    manifest.description.as_deref().unwrap_or_default(),
                )
                .await
                .map_err(|err| report(&err.to_string()))?;
            output::success(&format!("Created app {}", output::emphasized(&ident.app)));
            app_id
        }
        Err(err) => return Err(report(&err.to_string())),
    };

    let app_version_id = service
        .create_version(&app_id, args.version.as_deref(), args.message.as_deref())
        .await
        .map_err(|err| report(&err.to_string()))?;

    // ===== ARCHIVE =====
    let src_dir = args.project_dir.clone().unwrap_or_else(|| args.app_dir.clone());
    let archive = tempfile::Builder::new()
        .prefix(ARCHIVE_PREFIX)
        .suffix(".tar")
        .tempfile_in(&src_dir)
        .map_err(|err| report(&format!("Failed to create archive file: {}", err)))?;

    let size = tar_create(&src_dir, archive.path(), &manifest.exclude)
        .map_err(|err| report(&err.to_string()))?;

    if size > MAX_ARCHIVE_BYTES {
        return Err(report(&format_archive_too_large(size)));
    }
    output::success(&format!("Created source archive ({})", format_size(size)));

    // ===== UPLOAD =====
    let upload_url = service
        .app_version_upload_url(&app_version_id)
        .await
        .map_err(|err| report(&err.to_string()))?;
    service
        .upload_app_source(&upload_url, archive.path(), size)
        .await
        .map_err(|err| report(&err.to_string()))?;
    output::success("Uploaded source archive");

    // The archive's job is done; the guard also removes it on every
    // earlier error path.
    drop(archive);

    // ===== DEPLOY =====
    let deployment_version_id = service
        .deploy_app(&app_version_id, &secrets)
        .await
        .map_err(|err| report(&err.to_string()))?;

    // ===== EVENTS =====
    let verbose = args.verbose;
    let mut last_status: Option<String> = None;
    let result = service
        .deploy_events(&deployment_version_id, cancel, &mut |event| {
            handle_deploy_event(event, verbose, &mut last_status)
        })
        .await;

    match result {
        Ok(()) => {}
        Err(ApiError::EventHandler(err)) => {
            let message = err
                .downcast_ref::<DeployFailure>()
                .map(DeployFailure::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(report(&message));
        }
        Err(err) => return Err(report(&err.to_string())),
    }

    output::success(&format!(
        "Deployed {} to organization {}",
        output::emphasized(&ident.app),
        output::emphasized(&ident.organization)
    ));

    // ===== FOLLOW =====
    if args.follow {
        follow_logs(service, &ident, cancel).await?;
    } else {
        output::muted(&format_logs_hint(&ident));
    }

    Ok(())
}

/// Interpret one deploy event. Returning an error stops the subscription
/// before the next event is observed.
fn handle_deploy_event(
    event: DeployEvent,
    verbose: bool,
    last_status: &mut Option<String>,
) -> Result<(), api::EventHandlerError> {
    match event {
        DeployEvent::BuildMessage { message } => {
            if verbose {
                for line in message.lines() {
                    output::muted(line);
                }
            }
            Ok(())
        }
        DeployEvent::BuildError { message } => {
            Err(Box::new(DeployFailure::BuildFailed { message }))
        }
        DeployEvent::StatusChanged { status } => match status.as_str() {
            "PENDING" | "RUNNING" => {
                if last_status.as_deref() != Some(status.as_str()) {
                    output::step(&format!("Deployment status: {}", status));
                    *last_status = Some(status);
                }
                Ok(())
            }
            _ => Err(Box::new(DeployFailure::StatusFailed { status })),
        },
    }
}

async fn follow_logs(
    service: &dyn AppService,
    ident: &AppIdentifier,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    output::step(&format!(
        "Following logs for {} (Ctrl+c to stop)",
        output::emphasized(&ident.app)
    ));

    let mut logs = service
        .app_deploy_logs(&ident.organization, &ident.app, None, true, cancel)
        .await
        .map_err(|err| report(&err.to_string()))?;

    // The channel closes after draining when the server ends the stream
    // or the ambient context is cancelled.
    while let Some(entry) = logs.recv().await {
        println!("{} {}", entry.timestamp.format("%Y-%m-%dT%H:%M:%S"), entry.text);
    }

    Ok(())
}

fn format_archive_too_large(size: u64) -> String {
    format!(
        "The source archive is too large: {} exceeds the {} limit. Use the 'exclude' field in numerous.toml to leave files out of the upload.",
        format_size(size),
        format_size(MAX_ARCHIVE_BYTES)
    )
}

fn format_logs_hint(ident: &AppIdentifier) -> String {
    format!(
        "Read the app logs with: numerous logs --organization {} --app {}",
        ident.organization, ident.app
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_and_running_statuses_are_accepted() {
        let mut last = None;
        assert!(
            handle_deploy_event(
                DeployEvent::StatusChanged {
                    status: "PENDING".to_string()
                },
                false,
                &mut last,
            )
            .is_ok()
        );
        assert!(
            handle_deploy_event(
                DeployEvent::StatusChanged {
                    status: "RUNNING".to_string()
                },
                false,
                &mut last,
            )
            .is_ok()
        );
        assert_eq!(last.as_deref(), Some("RUNNING"));
    }

    #[test]
    fn any_other_status_is_terminal() {
        for status in ["STOPPED", "ERROR", "UNKNOWN", "SOMETHING_NEW"] {
            let mut last = None;
            let err = handle_deploy_event(
                DeployEvent::StatusChanged {
                    status: status.to_string(),
                },
                false,
                &mut last,
            )
            .expect_err("status should be terminal");
            let failure = err.downcast_ref::<DeployFailure>().expect("deploy failure");
            assert_eq!(
                *failure,
                DeployFailure::StatusFailed {
                    status: status.to_string()
                }
            );
        }
    }

    #[test]
    fn build_errors_are_terminal() {
        let mut last = None;
        let err = handle_deploy_event(
            DeployEvent::BuildError {
                message: "missing entrypoint".to_string(),
            },
            true,
            &mut last,
        )
        .expect_err("build error should be terminal");
        let failure = err.downcast_ref::<DeployFailure>().expect("deploy failure");
        assert_eq!(
            *failure,
            DeployFailure::BuildFailed {
                message: "missing entrypoint".to_string()
            }
        );
    }

    #[test]
    fn build_messages_never_fail_the_handler() {
        let mut last = None;
        assert!(
            handle_deploy_event(
                DeployEvent::BuildMessage {
                    message: "step 1\nstep 2".to_string()
                },
                true,
                &mut last,
            )
            .is_ok()
        );
    }

    #[test]
    fn archive_too_large_message_names_the_exclude_field() {
        let message = format_archive_too_large(6 * 1024 * 1024 * 1024);
        assert!(message.contains("6.0 GiB"));
        assert!(message.contains("5.0 GiB"));
        assert!(message.contains("exclude"));
    }
}
