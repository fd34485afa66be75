//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 注册表检查：判断目标存储是否已注册，只读。

use crate::error::{ProvisionError, Result};
use crate::provision::bounded;
use crate::registry::model::RegistryState;
use crate::registry::RegistryClient;
use tokio::time::Duration;
use tracing::{debug, instrument};

/// 一次检查的结果，包含读取到的注册表快照
#[derive(Debug, Clone)]
pub struct Inspection {
    pub exists: bool,
    pub state: RegistryState,
}

/// 注册表检查器
pub struct RegistryInspector<'a, C: RegistryClient + ?Sized> {
    client: &'a C,
    timeout: Duration,
}

impl<'a, C: RegistryClient + ?Sized> RegistryInspector<'a, C> {
    pub fn new(client: &'a C, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// 读取注册表快照，任何读取失败都视为配置访问错误
    pub async fn snapshot(&self) -> Result<RegistryState> {
        bounded(
            self.timeout,
            "registry read",
            ProvisionError::ConfigAccess,
            self.client.load(),
        )
        .await
        .map_err(|e| match e {
            ProvisionError::ConfigAccess(_) => e,
            other => ProvisionError::ConfigAccess(other.to_string()),
        })
    }

    /// 名称为 `name` 的存储是否存在；不存在不是错误
    pub async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.inspect(name).await?.exists)
    }

    /// 检查存储是否存在，同时返回快照
    #[instrument(skip(self), level = "debug")]
    pub async fn inspect(&self, name: &str) -> Result<Inspection> {
        let state = self.snapshot().await?;
        let exists = state.contains(name);
        debug!(exists, version = state.version, "Inspected store '{}'", name);
        Ok(Inspection { exists, state })
    }
}
