//! calsweep CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use calsweep_client::cli::{AuthProvider, Cli, Command, ConfigAction};
use calsweep_client::commands;
use calsweep_client::config::ClientConfig;
use calsweep_client::error::{ClientError, ClientResult};
use calsweep_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // help and version go to stdout and are not failures
            let failed = e.use_stderr();
            let _ = e.print();
            return if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing_config.with_format(cli.log_format)) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            if e.is_transient() {
                eprintln!("hint: the failure looks temporary, rerunning the same command is safe");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let (config, config_path) = load_config(cli.config.as_ref())?;
    let mode = cli.mode();

    match cli.command {
        Some(Command::Auth { provider }) => match provider {
            #[cfg(feature = "google")]
            AuthProvider::Google {
                client_id,
                client_secret,
                credentials_file,
                force,
            } => {
                commands::auth::google(
                    client_id,
                    client_secret,
                    credentials_file,
                    force,
                    &config,
                    &config_path,
                )
                .await
            }
        },
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path),
        },
        None => {
            let (Some(start), Some(end)) = (cli.start.as_deref(), cli.end.as_deref()) else {
                return Err(ClientError::Config("START and END are required".to_string()));
            };
            commands::run::run(start, end, &mode, &config).await
        }
    }
}

/// An explicit `--config` must exist; the default path may be missing.
fn load_config(explicit: Option<&PathBuf>) -> ClientResult<(ClientConfig, PathBuf)> {
    match explicit {
        Some(path) => Ok((ClientConfig::load_from(path)?, path.clone())),
        None => Ok((ClientConfig::load()?, ClientConfig::default_path())),
    }
}
