//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了 Redis 兼容存储的连接提供者和清理实现。

use crate::backend::StorePurger;
use crate::error::{ProvisionError, Result};
use crate::registry::model::{BackendConfig, BackendDescriptor, RedisStoreConfig};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, instrument};

/// 每次 SCAN 的建议批量
const SCAN_BATCH: usize = 1000;

#[async_trait]
pub trait RedisProvider: Send + Sync {
    async fn get_connection(
        &self,
        config: &RedisStoreConfig,
        connection_timeout_ms: u64,
    ) -> Result<ConnectionManager>;
}

pub struct DefaultRedisProvider;

#[async_trait]
impl RedisProvider for DefaultRedisProvider {
    async fn get_connection(
        &self,
        config: &RedisStoreConfig,
        connection_timeout_ms: u64,
    ) -> Result<ConnectionManager> {
        let connection_info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(config.server.host().to_string(), config.server.port()),
            redis: RedisConnectionInfo {
                db: i64::from(config.database),
                username: None,
                password: config
                    .password
                    .as_ref()
                    .map(|p| p.expose_secret().to_string())
                    .filter(|p| !p.is_empty()),
                protocol: redis::ProtocolVersion::RESP2,
            },
        };

        let client = Client::open(connection_info)?;
        match timeout(
            Duration::from_millis(connection_timeout_ms),
            client.get_connection_manager(),
        )
        .await
        {
            Ok(res) => Ok(res?),
            Err(_) => Err(ProvisionError::Purge {
                store: config.server.to_string(),
                reason: format!(
                    "connection timed out after {}ms. Target: {}",
                    connection_timeout_ms, config.server
                ),
            }),
        }
    }
}

/// Redis 兼容存储清理器
///
/// 只删除带有存储前缀的键，同一数据库中的其他数据（例如会话）不受影响
pub struct RedisPurger {
    provider: Arc<dyn RedisProvider>,
    connection_timeout_ms: u64,
}

impl RedisPurger {
    pub fn new(connection_timeout_ms: u64) -> Self {
        Self::with_provider(Arc::new(DefaultRedisProvider), connection_timeout_ms)
    }

    pub fn with_provider(provider: Arc<dyn RedisProvider>, connection_timeout_ms: u64) -> Self {
        Self {
            provider,
            connection_timeout_ms,
        }
    }

    /// 删除前缀下的全部键，返回删除的键数量
    #[instrument(
        skip(self, config),
        level = "debug",
        fields(server = %config.server, db = config.database)
    )]
    pub async fn purge_prefix(&self, config: &RedisStoreConfig) -> Result<usize> {
        let mut conn = self
            .provider
            .get_connection(config, self.connection_timeout_ms)
            .await?;
        let pattern = format!("{}*", config.prefix);
        debug!("Redis purge: SCAN MATCH {}", pattern);

        let mut removed = 0usize;
        let mut cursor = 0u64;
        loop {
            // 键按字节读取，前缀下的非 UTF-8 键同样删除
            let (next_cursor, keys): (u64, Vec<Vec<u8>>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let mut pipe = redis::pipe();
                for key in &keys {
                    pipe.del(key.as_slice()).ignore();
                }
                pipe.query_async::<()>(&mut conn).await?;
                removed += keys.len();
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(removed)
    }
}

#[async_trait]
impl StorePurger for RedisPurger {
    async fn purge(&self, descriptor: &BackendDescriptor) -> Result<()> {
        let BackendConfig::Redis(config) = &descriptor.config else {
            return Err(ProvisionError::Purge {
                store: descriptor.name.clone(),
                reason: format!("store is of kind '{}', not redis", descriptor.kind()),
            });
        };
        let removed = self.purge_prefix(config).await?;
        info!(store = %descriptor.name, removed, "Redis store purged");
        Ok(())
    }
}
