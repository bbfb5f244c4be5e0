//! Indicator registry binary.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use indicator_registry::cli::{Cli, Commands, ServeArgs, ValidateArgs};
use indicator_registry::RegistryServer;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => serve(&args).await,
        Commands::Validate(args) => validate(&args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(args: &ServeArgs) -> anyhow::Result<ExitCode> {
    let config = args.to_config().context("invalid configuration")?;
    let patches = config.load_patches().context("failed to load patches")?;

    info!("Starting indicator registry on {}", config.bind_addr);
    let server = RegistryServer::new(config, patches);
    server
        .serve_with_shutdown(shutdown_signal())
        .await
        .context("registry server failed")?;

    Ok(ExitCode::SUCCESS)
}

fn validate(args: &ValidateArgs) -> anyhow::Result<ExitCode> {
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();

    let valid = args
        .execute(&mut stdout, &mut stderr)
        .with_context(|| format!("failed to validate {}", args.document.display()))?;

    Ok(if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
