use clap::Parser;
use tracing_subscriber::EnvFilter;

use numerous::cli::Cli;
use numerous::shutdown::SHUTDOWN;
use numerous::{errors, output};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    output::set_verbose(cli.verbose);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cli.verbose {
                EnvFilter::new("info")
            } else {
                EnvFilter::new("warn")
            }
        }))
        .with_target(false)
        .init();

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            SHUTDOWN.cancel();
        }
    });

    if let Err(e) = cli.run(&SHUTDOWN).await {
        if !errors::is_handled(e.as_ref()) {
            output::error_stderr(&format!("An unexpected error occurred: {}", e));
            eprintln!("Please report the issue at https://github.com/numerous-com/numerous-cli/issues");
        }
        std::process::exit(1);
    }
}
