//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 模式映射重写：把逻辑缓存模式指向具体存储。

use crate::error::{ProvisionError, Result};
use crate::provision::bounded;
use crate::registry::model::{CacheMode, ModeMappings, RegistryState};
use crate::registry::RegistryClient;
use tokio::time::Duration;
use tracing::{info, instrument};

/// 一次映射提交前后的映射表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingChange {
    pub before: ModeMappings,
    pub after: ModeMappings,
    /// 提交后的注册表版本
    pub version: u64,
}

impl MappingChange {
    /// 本次提交中存储列表发生变化的模式
    pub fn changed_modes(&self) -> Vec<CacheMode> {
        CacheMode::ALL
            .into_iter()
            .filter(|mode| self.before.get(*mode) != self.after.get(*mode))
            .collect()
    }
}

/// 在给定快照上计算新的映射表，不写入
///
/// 每个被修改的模式整体替换；请求级模式不接受网络存储，
/// 无论调用方如何请求。
pub fn plan_mappings(
    state: &RegistryState,
    changes: &[(CacheMode, Vec<String>)],
) -> Result<ModeMappings> {
    let mut candidate = state.mappings.clone();
    for (mode, names) in changes {
        if names.is_empty() {
            return Err(ProvisionError::MappingIntegrity(format!(
                "mode '{}' would be left without a store",
                mode
            )));
        }
        if *mode == CacheMode::Request {
            if let Some(network) = names
                .iter()
                .filter_map(|n| state.get(n))
                .find(|d| d.kind().is_network())
            {
                return Err(ProvisionError::MappingIntegrity(format!(
                    "request mode must stay on a local store, refusing '{}' ({})",
                    network.name,
                    network.kind()
                )));
            }
        }
        candidate.set(*mode, names.clone());
    }
    candidate.validate_against(&state.stores)?;
    Ok(candidate)
}

/// 模式映射重写器
pub struct MappingRewriter<'a, C: RegistryClient + ?Sized> {
    client: &'a C,
    timeout: Duration,
}

impl<'a, C: RegistryClient + ?Sized> MappingRewriter<'a, C> {
    pub fn new(client: &'a C, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// 在给定快照上应用映射修改并提交
    ///
    /// 所有修改在一次写入中提交，任一校验失败时不写入任何内容
    #[instrument(skip(self, state, changes), level = "info", fields(version = state.version))]
    pub async fn apply_to(
        &self,
        state: &RegistryState,
        changes: &[(CacheMode, Vec<String>)],
    ) -> Result<MappingChange> {
        let after = plan_mappings(state, changes)?;

        let version = bounded(
            self.timeout,
            "mapping update",
            ProvisionError::ConfigAccess,
            self.client.set_mappings(after.clone(), state.version),
        )
        .await?;

        for (mode, names) in changes {
            info!("Mode '{}' mapped to [{}]", mode, names.join(", "));
        }

        Ok(MappingChange {
            before: state.mappings.clone(),
            after,
            version,
        })
    }

    /// 读取当前注册表后，整体替换单个模式的存储列表
    pub async fn set_mapping(&self, mode: CacheMode, names: Vec<String>) -> Result<MappingChange> {
        let state = bounded(
            self.timeout,
            "registry read",
            ProvisionError::ConfigAccess,
            self.client.load(),
        )
        .await?;
        self.apply_to(&state, &[(mode, names)]).await
    }
}
