//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了宿主缓存注册表的访问接口及其实现。

pub mod file;
pub mod model;

use crate::error::Result;
use async_trait::async_trait;

pub use file::FileRegistry;
pub use model::{
    BackendConfig, BackendDescriptor, BackendKind, CacheMode, CompressionMode, ConnectionTarget,
    FileStoreConfig, ModeMappings, RedisStoreConfig, RegistryState, SerializerMode,
};

/// 宿主缓存注册表客户端
///
/// 写操作均携带 `expected_version`，版本不一致时返回
/// [`ConcurrentModification`](crate::error::ProvisionError::ConcurrentModification)。
/// 每次成功写入使版本号恰好加一。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// 读取当前注册表状态（存储列表和模式映射）
    async fn load(&self) -> Result<RegistryState>;

    /// 新建存储，名称已存在时必须拒绝而不是覆盖
    async fn create_store(
        &self,
        descriptor: BackendDescriptor,
        expected_version: u64,
    ) -> Result<BackendDescriptor>;

    /// 整体替换模式映射表，返回新版本号
    async fn set_mappings(&self, mappings: ModeMappings, expected_version: u64) -> Result<u64>;

    /// 清空单个存储中的全部条目
    async fn purge_store(&self, descriptor: &BackendDescriptor) -> Result<()>;
}
