use crate::cli::SessionConfigArgs;
use crate::config::ProvisionConfig;
use crate::session::SessionHandlerSettings;
use anyhow::{Context, Result};
use std::process::ExitCode;

pub fn execute(config: &ProvisionConfig, args: &SessionConfigArgs) -> Result<ExitCode> {
    let settings = SessionHandlerSettings::from_config(config, args.show_secrets);
    let rendered = settings
        .to_toml()
        .context("Cannot render session handler settings")?;
    print!("{}", rendered);
    Ok(ExitCode::SUCCESS)
}
