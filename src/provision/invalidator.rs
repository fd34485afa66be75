//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 缓存失效：映射变更后清空所有被映射存储中的旧条目。

use crate::error::{ProvisionError, Result};
use crate::provision::bounded;
use crate::provision::mapping::MappingChange;
use crate::registry::model::{BackendKind, RegistryState};
use crate::registry::RegistryClient;
use tokio::time::Duration;
use tracing::{info, instrument, warn};

/// 单个存储的清理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub store: String,
    pub kind: Option<BackendKind>,
    /// 失败原因，成功时为 None
    pub error: Option<String>,
}

impl PurgeOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 全部存储的清理汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub outcomes: Vec<PurgeOutcome>,
}

impl PurgeReport {
    /// 所有存储都清理成功
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(PurgeOutcome::is_success)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &PurgeOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &PurgeOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// 失败的存储转为错误列表
    pub fn errors(&self) -> Vec<ProvisionError> {
        self.failed()
            .map(|o| ProvisionError::Purge {
                store: o.store.clone(),
                reason: o.error.clone().unwrap_or_default(),
            })
            .collect()
    }
}

/// 缓存失效器
///
/// 逐个清理存储，某个存储失败后继续清理其余存储
pub struct CacheInvalidator<'a, C: RegistryClient + ?Sized> {
    client: &'a C,
    timeout: Duration,
}

impl<'a, C: RegistryClient + ?Sized> CacheInvalidator<'a, C> {
    pub fn new(client: &'a C, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// 读取当前注册表并清理所有被映射的存储
    pub async fn purge_all(&self) -> Result<PurgeReport> {
        let state = bounded(
            self.timeout,
            "registry read",
            ProvisionError::ConfigAccess,
            self.client.load(),
        )
        .await?;
        Ok(self.purge_mapped(&state).await)
    }

    /// 清理快照中每个模式映射到的存储（去重，按模式和优先级顺序）
    pub async fn purge_mapped(&self, state: &RegistryState) -> PurgeReport {
        self.purge_stores(state, state.mappings.mapped_stores()).await
    }

    /// 映射变更后的清理：先清理新映射的存储，再清理被移出映射的旧存储
    ///
    /// 旧存储里的条目在之后重新映射回来时不能再被读到
    pub async fn purge_for_change(
        &self,
        state: &RegistryState,
        change: &MappingChange,
    ) -> PurgeReport {
        let mut names = change.after.mapped_stores();
        for name in change.before.mapped_stores() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        self.purge_stores(state, names).await
    }

    #[instrument(skip(self, state, names), level = "info", fields(version = state.version))]
    async fn purge_stores(&self, state: &RegistryState, names: Vec<&str>) -> PurgeReport {
        let mut report = PurgeReport::default();

        for name in names {
            let Some(descriptor) = state.get(name) else {
                warn!("Mapped store '{}' is not registered, cannot purge", name);
                report.outcomes.push(PurgeOutcome {
                    store: name.to_string(),
                    kind: None,
                    error: Some("store is not registered".to_string()),
                });
                continue;
            };

            let operation = format!("purge of '{}'", name);
            let result = bounded(
                self.timeout,
                &operation,
                |reason| ProvisionError::Purge {
                    store: String::new(),
                    reason,
                },
                self.client.purge_store(descriptor),
            )
            .await;

            let error = match result {
                Ok(()) => {
                    info!("Store '{}' purged", name);
                    None
                }
                Err(ProvisionError::Purge { reason, .. }) => {
                    warn!("Purge of store '{}' failed: {}", name, reason);
                    Some(reason)
                }
                Err(e) => {
                    warn!("Purge of store '{}' failed: {}", name, e);
                    Some(e.to_string())
                }
            };
            report.outcomes.push(PurgeOutcome {
                store: name.to_string(),
                kind: Some(descriptor.kind()),
                error,
            });
        }

        report
    }
}
