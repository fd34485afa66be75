//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了各类存储的清理实现：Redis 兼容存储、文件存储和内存存储。

pub mod file;
pub mod redis_provider;

use crate::error::Result;
use crate::registry::model::{BackendConfig, BackendDescriptor};
use async_trait::async_trait;
use tracing::debug;

pub use file::FilePurger;
pub use redis_provider::{DefaultRedisProvider, RedisProvider, RedisPurger};

/// 存储清理接口
#[async_trait]
pub trait StorePurger: Send + Sync {
    /// 删除存储中的全部条目
    async fn purge(&self, descriptor: &BackendDescriptor) -> Result<()>;
}

/// 按存储类型分派的默认清理器
pub struct DefaultStorePurger {
    redis: RedisPurger,
    file: FilePurger,
}

impl DefaultStorePurger {
    /// # 参数
    ///
    /// * `connection_timeout_ms` - 连接 Redis 兼容存储的超时时间（毫秒）
    pub fn new(connection_timeout_ms: u64) -> Self {
        Self {
            redis: RedisPurger::new(connection_timeout_ms),
            file: FilePurger,
        }
    }
}

#[async_trait]
impl StorePurger for DefaultStorePurger {
    async fn purge(&self, descriptor: &BackendDescriptor) -> Result<()> {
        match &descriptor.config {
            BackendConfig::Redis(_) => self.redis.purge(descriptor).await,
            BackendConfig::File(_) => self.file.purge(descriptor).await,
            BackendConfig::Memory => {
                // 进程内存储不跨进程持久化
                debug!(store = %descriptor.name, "memory store has nothing to purge");
                Ok(())
            }
        }
    }
}
