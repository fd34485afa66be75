//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 文件存储清理实现。

use crate::backend::StorePurger;
use crate::error::{ProvisionError, Result};
use crate::registry::model::{BackendConfig, BackendDescriptor};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// 文件存储清理器
///
/// 删除缓存目录下的全部内容，目录本身保留
#[derive(Debug, Default, Clone, Copy)]
pub struct FilePurger;

impl FilePurger {
    /// 清空目录，返回删除的条目数量；目录不存在视为已清空
    pub async fn purge_dir(&self, dir: &Path) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("File purge: {} does not exist", dir.display());
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await?;
            } else {
                tokio::fs::remove_file(&path).await?;
            }
            removed += 1;
        }
        Ok(removed)
    }
}

#[async_trait]
impl StorePurger for FilePurger {
    async fn purge(&self, descriptor: &BackendDescriptor) -> Result<()> {
        let BackendConfig::File(config) = &descriptor.config else {
            return Err(ProvisionError::Purge {
                store: descriptor.name.clone(),
                reason: format!("store is of kind '{}', not file", descriptor.kind()),
            });
        };
        let removed = self.purge_dir(&config.path).await?;
        info!(store = %descriptor.name, removed, "File store purged");
        Ok(())
    }
}
