//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 统一工具模块
//!
//! 包括唯一名称生成和敏感信息脱敏。

pub mod redaction;

/// 生成带随机后缀的名称，避免测试之间互相干扰
pub fn generate_unique_name(base: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", base, &suffix[..8])
}
