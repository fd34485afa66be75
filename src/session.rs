//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块生成宿主会话处理器的设置，使 HTTP 会话存储指向同一个 Valkey 服务。

use crate::config::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use crate::utils::redaction::redact_secret;
use secrecy::ExposeSecret;
use serde::Serialize;

/// 宿主的 Redis 会话处理器类
pub const REDIS_SESSION_HANDLER: &str = "\\core\\session\\redis";

/// 会话处理器设置，字段名与宿主配置项一致
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SessionHandlerSettings {
    pub session_handler_class: String,
    pub session_redis_host: String,
    pub session_redis_port: u16,
    pub session_redis_auth: String,
    pub session_redis_database: u8,
    pub session_redis_prefix: String,
    pub session_redis_acquire_lock_timeout: u64,
    pub session_redis_lock_expire: u64,
}

impl SessionHandlerSettings {
    /// 由配置生成会话设置
    ///
    /// # 参数
    ///
    /// * `config` - 配置
    /// * `show_secrets` - 是否输出明文密码
    pub fn from_config(config: &ProvisionConfig, show_secrets: bool) -> Self {
        let auth = if show_secrets {
            config
                .valkey
                .password()
                .map(|p| p.expose_secret().to_string())
                .unwrap_or_default()
        } else {
            redact_secret(config.valkey.password())
        };

        Self {
            session_handler_class: REDIS_SESSION_HANDLER.to_string(),
            session_redis_host: config.valkey.host.clone(),
            session_redis_port: config.valkey.port,
            session_redis_auth: auth,
            session_redis_database: config.session.database,
            session_redis_prefix: config.session.prefix.clone(),
            session_redis_acquire_lock_timeout: config.session.acquire_lock_timeout,
            session_redis_lock_expire: config.session.lock_expire,
        }
    }

    /// 渲染为 TOML 文本
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ProvisionError::Serialization(e.to_string()))
    }
}
