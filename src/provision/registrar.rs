//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 存储注册：把新的存储定义写入注册表。

use crate::error::{ProvisionError, Result};
use crate::provision::bounded;
use crate::registry::model::BackendDescriptor;
use crate::registry::RegistryClient;
use tokio::time::Duration;
use tracing::{info, instrument};

/// 存储注册器
///
/// 只应在检查结果为“不存在”时调用；幂等性由编排层保证。
/// 注册表对重名存储返回错误，已有定义不会被覆盖。
pub struct Registrar<'a, C: RegistryClient + ?Sized> {
    client: &'a C,
    timeout: Duration,
}

impl<'a, C: RegistryClient + ?Sized> Registrar<'a, C> {
    pub fn new(client: &'a C, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// 注册存储，返回注册表持久化后的定义
    ///
    /// # 参数
    ///
    /// * `descriptor` - 存储定义
    /// * `expected_version` - 检查时读取到的注册表版本
    #[instrument(
        skip(self, descriptor),
        level = "info",
        fields(store = %descriptor.name, kind = %descriptor.kind())
    )]
    pub async fn register(
        &self,
        descriptor: BackendDescriptor,
        expected_version: u64,
    ) -> Result<BackendDescriptor> {
        descriptor.validate()?;

        let persisted = bounded(
            self.timeout,
            "store registration",
            ProvisionError::Registration,
            self.client.create_store(descriptor, expected_version),
        )
        .await
        .map_err(|e| match e {
            ProvisionError::Registration(_) | ProvisionError::ConcurrentModification { .. } => e,
            other => ProvisionError::Registration(other.to_string()),
        })?;

        match persisted.connection_target() {
            Some(target) => info!(server = %target, "Store '{}' registered", persisted.name),
            None => info!("Store '{}' registered", persisted.name),
        }
        Ok(persisted)
    }
}
