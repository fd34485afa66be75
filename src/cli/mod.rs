//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::ProvisionConfig;

#[derive(Parser, Debug)]
#[command(name = "valkey-muc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, global = true, help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Cache registry file (overrides configuration)")]
    pub registry: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        name = "provision",
        about = "Register the Valkey store, map cache modes to it and purge caches (default)"
    )]
    Provision,

    #[command(name = "status", about = "Show registered cache stores and mode mappings")]
    Status(StatusArgs),

    #[command(name = "session-config", about = "Print session handler settings for Valkey")]
    SessionConfig(SessionConfigArgs),
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[arg(short, long, help = "Output in JSON format")]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct SessionConfigArgs {
    #[arg(long, help = "Print the password in clear text")]
    pub show_secrets: bool,
}

mod provision;
mod session;
mod status;

/// 解析命令行并执行，返回进程退出码
pub async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    crate::telemetry::init_tracing(env!("CARGO_PKG_NAME"), cli.verbose);

    let config = load_config(&cli)?;

    match &cli.command {
        None | Some(Commands::Provision) => provision::execute(&config).await,
        Some(Commands::Status(args)) => status::execute(&config, args).await,
        Some(Commands::SessionConfig(args)) => session::execute(&config, args),
    }
}

fn load_config(cli: &Cli) -> Result<ProvisionConfig> {
    let mut config = ProvisionConfig::load(cli.config.as_deref()).with_context(|| {
        match &cli.config {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration from environment".to_string(),
        }
    })?;
    if let Some(registry) = &cli.registry {
        config.registry.path = registry.clone();
    }
    Ok(config)
}
