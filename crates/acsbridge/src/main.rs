mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use acsbridge_core::{ConfigService, GenieAcs};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need an ACS connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "acsbridge", &mut std::io::stdout());
            Ok(())
        }

        Command::Catalog(args) => {
            let cfg = config::load_config_or_default();
            commands::catalog::handle(&cfg.path_catalog(), &args, &cli.global)
        }

        // Everything else talks to the ACS
        cmd => {
            let cfg = config::load_config_or_default();
            let acs_config = config::resolve_acs_config(&cli.global, &cfg)?;
            let acs = Arc::new(GenieAcs::connect(&acs_config)?);
            let service = ConfigService::new(
                Arc::clone(&acs),
                acs,
                cfg.path_catalog(),
                cfg.sync.to_sync_config()?,
            );

            tracing::debug!(command = ?cmd, url = %acs_config.url, "dispatching command");
            let result = commands::dispatch(cmd, &service, &cli.global, &cfg).await;
            service.sync().shutdown().await;
            result
        }
    }
}
