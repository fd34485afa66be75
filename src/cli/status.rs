use crate::cli::StatusArgs;
use crate::config::ProvisionConfig;
use crate::provision::report::render_state;
use crate::registry::{BackendConfig, FileRegistry, RegistryClient, RegistryState};
use crate::utils::redaction::redact_secret;
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::process::ExitCode;

pub async fn execute(config: &ProvisionConfig, args: &StatusArgs) -> Result<ExitCode> {
    let registry = FileRegistry::new(
        &config.registry.path,
        &config.registry.dataroot,
        config.valkey.connection_timeout_ms,
    );
    let state = registry
        .load()
        .await
        .with_context(|| format!("Cannot read registry {}", registry.path().display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&redacted(&state))?);
    } else {
        print!("{}", render_state(&state));
    }

    if let Err(e) = state.check_integrity() {
        eprintln!("\n⚠️  {}", e);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

// JSON 输出中的密码统一替换为掩码
fn redacted(state: &RegistryState) -> RegistryState {
    let mut state = state.clone();
    for descriptor in state.stores.values_mut() {
        if let BackendConfig::Redis(redis) = &mut descriptor.config {
            if redis.password.is_some() {
                let masked = redact_secret(redis.password.as_ref());
                redis.password = Some(SecretString::from(masked));
            }
        }
    }
    state
}
