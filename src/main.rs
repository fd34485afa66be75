//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块是配置下发工具的入口点。

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match valkey_muc::cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
