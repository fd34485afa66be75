//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存配置下发过程中的错误类型和处理机制。

use thiserror::Error;

/// 缓存配置下发错误类型枚举
///
/// 除 `Purge` 外均为致命错误，会立即终止编排流程
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// 注册表不可读或不可写
    #[error("Config access error: {0}")]
    ConfigAccess(String),

    /// 注册表在读取之后被其他管理者修改
    #[error("Registry was modified concurrently: expected version {expected}, found {actual}")]
    ConcurrentModification { expected: u64, actual: u64 },

    /// 存储定义非法或写入失败
    #[error("Registration error: {0}")]
    Registration(String),

    /// 映射会导致某个模式无后端，或违反请求级隔离规则
    #[error("Mapping integrity error: {0}")]
    MappingIntegrity(String),

    /// 单个后端清理失败（非致命，收集后汇总）
    #[error("Purge of store '{store}' failed: {reason}")]
    Purge { store: String, reason: String },

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Redis错误
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// 是否为并发修改冲突
    pub fn is_conflict(&self) -> bool {
        matches!(self, ProvisionError::ConcurrentModification { .. })
    }
}

/// 配置下发结果类型别名
pub type Result<T> = std::result::Result<T, ProvisionError>;
