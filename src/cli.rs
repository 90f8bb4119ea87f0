use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::commands::{deploy, login, logout, logs, status};

/// Numerous - deploy and manage apps on the Numerous platform
#[derive(Parser)]
#[command(name = "numerous")]
#[command(version)]
#[command(about = "Numerous - deploy and manage apps on the Numerous platform")]
pub struct Cli {
    /// Show verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in to the platform
    Login,

    /// Log out and remove stored credentials
    Logout,

    /// Show the local login state
    Status,

    /// Deploy an app directory to the platform
    Deploy {
        /// Organization slug to deploy to
        #[arg(short = 'o', long)]
        organization: Option<String>,

        /// App slug to deploy as
        #[arg(short = 'a', long)]
        app: Option<String>,

        /// Directory to archive instead of the app directory
        #[arg(short = 'p', long)]
        project_dir: Option<PathBuf>,

        /// Version label for the created app version
        #[arg(long)]
        version: Option<String>,

        /// Message attached to the created app version
        #[arg(long)]
        message: Option<String>,

        /// Follow runtime logs after a successful deploy
        #[arg(short = 'f', long)]
        follow: bool,

        /// App directory containing numerous.toml (defaults to the
        /// current directory)
        #[arg(value_name = "APP_DIR", default_value = ".")]
        app_dir: PathBuf,
    },

    /// Stream runtime logs for a deployed app
    Logs {
        /// Organization slug of the app
        #[arg(short = 'o', long)]
        organization: Option<String>,

        /// App slug
        #[arg(short = 'a', long)]
        app: Option<String>,

        /// Number of past log entries to include
        #[arg(long)]
        tail: Option<u32>,

        /// App directory containing numerous.toml (defaults to the
        /// current directory)
        #[arg(value_name = "APP_DIR", default_value = ".")]
        app_dir: PathBuf,
    },
}

impl Cli {
    /// Dispatch the parsed command. Commands needing the platform gate
    /// on a logged-in user as their first step and refresh an expired
    /// token exactly once.
    pub async fn run(self, cancel: &CancellationToken) -> Result<(), Box<dyn std::error::Error>> {
        match self.command {
            Commands::Login => login::run(cancel).await,
            Commands::Logout => logout::run().await,
            Commands::Status => status::run().await,
            Commands::Deploy {
                organization,
                app,
                project_dir,
                version,
                message,
                follow,
                app_dir,
            } => {
                deploy::run(
                    deploy::DeployArgs {
                        app_dir,
                        project_dir,
                        organization,
                        app,
                        version,
                        message,
                        verbose: self.verbose,
                        follow,
                    },
                    cancel,
                )
                .await
            }
            Commands::Logs {
                organization,
                app,
                tail,
                app_dir,
            } => {
                logs::run(
                    logs::LogsArgs {
                        app_dir,
                        organization,
                        app,
                        tail,
                    },
                    cancel,
                )
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_defaults_to_current_directory() {
        let cli = Cli::try_parse_from(["numerous", "deploy"]).unwrap();
        let Commands::Deploy {
            app_dir,
            organization,
            follow,
            ..
        } = cli.command
        else {
            panic!("expected Deploy");
        };
        assert_eq!(app_dir, PathBuf::from("."));
        assert!(organization.is_none());
        assert!(!follow);
    }

    #[test]
    fn deploy_parses_all_flags() {
        let cli = Cli::try_parse_from([
            "numerous", "deploy", "-o", "acme", "-a", "my-app", "-p", "../repo", "--version",
            "1.2.0", "--message", "release", "-f", "apps/web",
        ])
        .unwrap();
        let Commands::Deploy {
            organization,
            app,
            project_dir,
            version,
            message,
            follow,
            app_dir,
        } = cli.command
        else {
            panic!("expected Deploy");
        };
        assert_eq!(organization.as_deref(), Some("acme"));
        assert_eq!(app.as_deref(), Some("my-app"));
        assert_eq!(project_dir, Some(PathBuf::from("../repo")));
        assert_eq!(version.as_deref(), Some("1.2.0"));
        assert_eq!(message.as_deref(), Some("release"));
        assert!(follow);
        assert_eq!(app_dir, PathBuf::from("apps/web"));
    }

    #[test]
    fn verbose_flag_is_global() {
        let cli = Cli::try_parse_from(["numerous", "deploy", "-v"]).unwrap();
        assert!(cli.verbose);

        let cli = Cli::try_parse_from(["numerous", "-v", "deploy"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn logs_parses_tail_count() {
        let cli = Cli::try_parse_from(["numerous", "logs", "--tail", "100"]).unwrap();
        let Commands::Logs { tail, .. } = cli.command else {
            panic!("expected Logs");
        };
        assert_eq!(tail, Some(100));
    }

    #[test]
    fn login_takes_no_arguments() {
        let cli = Cli::try_parse_from(["numerous", "login"]).unwrap();
        assert!(matches!(cli.command, Commands::Login));

        let res = Cli::try_parse_from(["numerous", "login", "extra"]);
        assert!(res.is_err());
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        let res = Cli::try_parse_from(["numerous", "dev"]);
        match res {
            Ok(_) => panic!("expected parse failure"),
            Err(err) => assert!(
                err.to_string().contains("unrecognized subcommand 'dev'"),
                "unexpected error: {err}"
            ),
        }
    }
}
