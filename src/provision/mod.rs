//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 外部缓存存储的幂等配置下发流程。
//!
//! 流程严格线性：检查 → （按需）注册 → 重写模式映射 → 清理缓存。

pub mod inspector;
pub mod invalidator;
pub mod mapping;
pub mod orchestrator;
pub mod registrar;
pub mod report;

use crate::error::{ProvisionError, Result};
use std::future::Future;
use tokio::time::{timeout, Duration};

pub use inspector::{Inspection, RegistryInspector};
pub use invalidator::{CacheInvalidator, PurgeOutcome, PurgeReport};
pub use mapping::{plan_mappings, MappingChange, MappingRewriter};
pub use orchestrator::{
    ProvisionFailure, ProvisionPlan, ProvisionState, ProvisionSummary, Provisioner,
    RegistrationOutcome, Step,
};
pub use registrar::Registrar;
pub use report::{ConsoleReporter, NullReporter, StepEvent, StepReporter};

/// 为注册表或清理调用加上超时
///
/// 超时时用 `on_timeout` 构造对应步骤的错误
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    operation: &str,
    on_timeout: fn(String) -> ProvisionError,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(on_timeout(format!(
            "{} timed out after {}ms",
            operation,
            limit.as_millis()
        ))),
    }
}
