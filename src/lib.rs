//! valkey-muc - Moodle 缓存注册表的 Valkey 配置下发工具
//!
//! 把一个 Valkey/Redis 存储注册到 MUC 缓存注册表，
//! 将 application 和 session 模式映射到该存储并清理旧缓存。
//! 多次运行结果一致。

#![doc(html_root_url = "https://docs.rs/valkey-muc/0.1.0")]

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod provision;
pub mod registry;
pub mod session;
pub mod telemetry;
pub mod utils;

// Re-export commonly used items
pub use config::ProvisionConfig;
pub use error::{ProvisionError, Result};
pub use provision::{ProvisionPlan, ProvisionSummary, Provisioner};
pub use registry::{FileRegistry, RegistryClient};

/// valkey-muc 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
