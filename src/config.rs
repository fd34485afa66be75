//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了配置下发工具的配置结构和解析逻辑。
//!
//! 配置按以下顺序叠加：内置默认值 → TOML 配置文件 → 环境变量。
//! 环境变量只在启动时读取一次。

use crate::error::{ProvisionError, Result};
use crate::registry::model::{
    BackendConfig, BackendDescriptor, CacheMode, CompressionMode, ConnectionTarget,
    RedisStoreConfig, SerializerMode, MAX_STORE_NAME_LENGTH,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const ENV_VALKEY_HOST: &str = "VALKEY_HOST";
pub const ENV_VALKEY_PORT: &str = "VALKEY_PORT";
pub const ENV_VALKEY_PASSWORD: &str = "VALKEY_PASSWORD";

/// 配置下发工具的完整配置
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Valkey 服务连接
    pub valkey: ValkeyConfig,
    /// 要注册的缓存存储
    pub store: StoreConfig,
    /// 会话处理器设置
    pub session: SessionConfig,
    /// 宿主注册表
    pub registry: RegistryConfig,
}

/// Valkey 服务连接配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ValkeyConfig {
    /// 主机名
    pub host: String,
    /// 端口
    pub port: u16,
    /// 密码（可选，使用 SecretString 保护）
    pub password: Option<SecretString>,
    /// 连接超时时间（毫秒）
    pub connection_timeout_ms: u64,
}

impl Default for ValkeyConfig {
    fn default() -> Self {
        Self {
            host: "valkey".to_string(),
            port: 6379,
            password: None,
            connection_timeout_ms: 5000,
        }
    }
}

impl ValkeyConfig {
    pub fn target(&self) -> Result<ConnectionTarget> {
        ConnectionTarget::new(self.host.clone(), self.port)
            .map_err(|e| ProvisionError::Config(e.to_string()))
    }

    /// 密码非空时返回
    pub fn password(&self) -> Option<&SecretString> {
        self.password
            .as_ref()
            .filter(|p| !p.expose_secret().is_empty())
    }
}

/// 缓存存储配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct StoreConfig {
    /// 存储名称
    pub name: String,
    /// 键前缀
    pub prefix: String,
    /// 数据库编号
    pub database: u8,
    /// 序列化方式
    pub serializer: SerializerMode,
    /// 压缩方式
    pub compressor: CompressionMode,
    /// 指向该存储的模式
    pub modes: Vec<CacheMode>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "valkey".to_string(),
            prefix: "muc_".to_string(),
            database: 1,
            serializer: SerializerMode::Native,
            compressor: CompressionMode::None,
            modes: vec![CacheMode::Application, CacheMode::Session],
        }
    }
}

/// 会话处理器配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SessionConfig {
    /// 数据库编号，与缓存存储分开
    pub database: u8,
    /// 会话键前缀
    pub prefix: String,
    /// 获取会话锁的超时时间（秒）
    pub acquire_lock_timeout: u64,
    /// 会话锁过期时间（秒）
    pub lock_expire: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            database: 0,
            prefix: "moodle_sess_".to_string(),
            acquire_lock_timeout: 120,
            lock_expire: 7200,
        }
    }
}

/// 宿主注册表配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RegistryConfig {
    /// 注册表文件
    pub path: PathBuf,
    /// 宿主数据目录
    pub dataroot: PathBuf,
    /// 单次注册表或清理操作的超时时间（毫秒）
    pub operation_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/moodledata/muc/registry.toml"),
            dataroot: PathBuf::from("/var/moodledata"),
            operation_timeout_ms: 30_000,
        }
    }
}

impl ProvisionConfig {
    /// 从配置文件（可选）和进程环境变量加载配置
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// 从配置文件（可选）和指定的环境变量查找函数加载配置
    ///
    /// # 参数
    ///
    /// * `path` - TOML 配置文件路径
    /// * `lookup` - 环境变量查找函数
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate().map_err(ProvisionError::Config)?;
        Ok(config)
    }

    /// 解析 TOML 配置文件
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            ProvisionError::Config(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    /// 用环境变量覆盖 Valkey 连接配置
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_VALKEY_HOST).filter(|v| !v.is_empty()) {
            self.valkey.host = host;
        }
        if let Some(port) = lookup(ENV_VALKEY_PORT).filter(|v| !v.is_empty()) {
            self.valkey.port = port.trim().parse().map_err(|_| {
                ProvisionError::Config(format!(
                    "{} '{}' is not a valid port",
                    ENV_VALKEY_PORT, port
                ))
            })?;
        }
        if let Some(password) = lookup(ENV_VALKEY_PASSWORD) {
            self.valkey.password = if password.is_empty() {
                None
            } else {
                Some(SecretString::from(password))
            };
        }
        Ok(())
    }

    /// 由配置构建要注册的存储定义
    pub fn store_descriptor(&self) -> Result<BackendDescriptor> {
        let descriptor = BackendDescriptor::new(
            self.store.name.clone(),
            BackendConfig::Redis(RedisStoreConfig {
                server: self.valkey.target()?,
                password: self.valkey.password().cloned(),
                prefix: self.store.prefix.clone(),
                database: self.store.database,
                serializer: self.store.serializer,
                compressor: self.store.compressor,
            }),
        )
        .with_default(true);
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有必需的字段都已设置，并且值在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.valkey.host.trim().is_empty() {
            return Err("Valkey host cannot be empty".to_string());
        }
        if self.valkey.port == 0 {
            return Err("Valkey port cannot be zero".to_string());
        }
        ConnectionTarget::new(self.valkey.host.clone(), self.valkey.port)
            .map_err(|e| format!("Invalid Valkey host '{}': {}", self.valkey.host, e))?;
        if !(100..=30_000).contains(&self.valkey.connection_timeout_ms) {
            return Err("connection_timeout_ms must be between 100 and 30000 ms".to_string());
        }

        let name = &self.store.name;
        if name.is_empty() {
            return Err("Store name cannot be empty".to_string());
        }
        if name.len() > MAX_STORE_NAME_LENGTH {
            return Err(format!(
                "Store name '{}' exceeds maximum length of {} characters",
                name, MAX_STORE_NAME_LENGTH
            ));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!(
                "Store name '{}' may only contain letters, digits and underscores",
                name
            ));
        }

        if self.store.database > 15 || self.session.database > 15 {
            return Err("Database index must be between 0 and 15".to_string());
        }
        if self.store.database == self.session.database
            && self.session.prefix.starts_with(&self.store.prefix)
        {
            // 清理缓存时按前缀扫描，会话键不能落在缓存前缀之下
            return Err(format!(
                "Session prefix '{}' overlaps store prefix '{}' in database {}",
                self.session.prefix, self.store.prefix, self.store.database
            ));
        }

        if self.store.modes.is_empty() {
            return Err(format!("Store '{}' must be mapped to at least one mode", name));
        }
        if self.store.modes.contains(&CacheMode::Request) {
            return Err(format!(
                "Store '{}' is network-backed and cannot serve the request mode",
                name
            ));
        }

        if !(100..=300_000).contains(&self.registry.operation_timeout_ms) {
            return Err("operation_timeout_ms must be between 100 and 300000 ms".to_string());
        }

        if self.session.acquire_lock_timeout == 0 {
            return Err("Session acquire_lock_timeout cannot be zero".to_string());
        }
        if self.session.lock_expire == 0 {
            return Err("Session lock_expire cannot be zero".to_string());
        }

        Ok(())
    }
}
