//! # Password manager CLI
//!
//! Command-line tools for self-service password operations.

#![forbid(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use pm_cli::{
    PmConfig,
    cli::{Cli, Command},
    commands::{
        run_challenge, run_change_password, run_check, run_reset_password, run_set_answers,
        run_set_password, run_verify_answer,
    },
    output::error,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = PmConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    if let Command::Check = cli.command {
        run_check(&config);
        return Ok(());
    }

    let manager = config.build()?;
    match cli.command {
        Command::ChangePassword { username } => run_change_password(&manager, &username).await?,
        Command::SetPassword { username } => run_set_password(&manager, &username).await?,
        Command::ResetPassword { username } => run_reset_password(&manager, &username).await?,
        Command::Challenge { username } => run_challenge(&manager, &username).await?,
        Command::VerifyAnswer {
            username,
            attribute,
        } => run_verify_answer(&manager, &username, &attribute).await?,
        Command::SetAnswers { username } => run_set_answers(&manager, &username).await?,
        Command::Check => {}
    }
    Ok(())
}
