use crate::config::ProvisionConfig;
use crate::provision::report::{render_failure, render_summary};
use crate::provision::{ConsoleReporter, ProvisionPlan, Provisioner};
use crate::registry::FileRegistry;
use anyhow::{Context, Result};
use std::process::ExitCode;
use tokio::time::Duration;

pub async fn execute(config: &ProvisionConfig) -> Result<ExitCode> {
    println!("=== Configuring Valkey for the application cache ===\n");

    let plan = ProvisionPlan::from_config(config).context("Invalid store definition")?;
    let registry = FileRegistry::new(
        &config.registry.path,
        &config.registry.dataroot,
        config.valkey.connection_timeout_ms,
    );
    println!("Registry: {}", registry.path().display());
    if let Some(target) = plan.descriptor.connection_target() {
        println!("Server:   {}\n", target);
    }

    let reporter = ConsoleReporter;
    let provisioner = Provisioner::new(
        &registry,
        plan,
        Duration::from_millis(config.registry.operation_timeout_ms),
        &reporter,
    );

    match provisioner.run().await {
        Ok(summary) => {
            print!("{}", render_summary(&summary));
            Ok(summary.exit_code())
        }
        Err(failure) => {
            eprintln!("{}", render_failure(&failure));
            Ok(failure.exit_code())
        }
    }
}
