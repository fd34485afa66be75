//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! Redis 兼容存储清理测试，需要可访问的 Valkey/Redis 实例，否则跳过

#[path = "../common/mod.rs"]
mod common;

use common::{generate_unique_prefix, setup_logging};
use redis::AsyncCommands;
use serial_test::serial;
use valkey_muc::backend::{DefaultRedisProvider, RedisProvider, RedisPurger, StorePurger};
use valkey_muc::registry::{BackendConfig, BackendDescriptor, RedisStoreConfig};

fn test_store(prefix: &str) -> RedisStoreConfig {
    let host = std::env::var("VALKEY_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("VALKEY_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(6379);
    RedisStoreConfig {
        server: format!("{}:{}", host, port).parse().unwrap(),
        password: std::env::var("VALKEY_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty())
            .map(secrecy::SecretString::from),
        prefix: prefix.to_string(),
        database: 1,
        serializer: Default::default(),
        compressor: Default::default(),
    }
}

async fn connect(config: &RedisStoreConfig) -> Option<redis::aio::ConnectionManager> {
    match DefaultRedisProvider.get_connection(config, 1000).await {
        Ok(conn) => Some(conn),
        Err(e) => {
            println!("跳过测试: Redis不可用 - {}", e);
            None
        }
    }
}

#[tokio::test]
#[serial]
async fn test_purge_removes_only_prefixed_keys() {
    setup_logging();
    let prefix = generate_unique_prefix("muc");
    let config = test_store(&prefix);
    let Some(mut conn) = connect(&config).await else {
        return;
    };

    let other_key = format!("sess_{}", prefix);
    for i in 0..25 {
        let _: () = conn.set(format!("{}{}", prefix, i), "stale").await.unwrap();
    }
    let _: () = conn.set(&other_key, "keep").await.unwrap();

    let purger = RedisPurger::new(1000);
    let removed = purger.purge_prefix(&config).await.unwrap();
    assert_eq!(removed, 25);

    let exists: bool = conn.exists(format!("{}0", prefix)).await.unwrap();
    assert!(!exists);
    let kept: Option<String> = conn.get(&other_key).await.unwrap();
    assert_eq!(kept.as_deref(), Some("keep"));

    let _: () = conn.del(&other_key).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_purge_through_store_purger() {
    let prefix = generate_unique_prefix("muc");
    let config = test_store(&prefix);
    let Some(mut conn) = connect(&config).await else {
        return;
    };
    let _: () = conn.set(format!("{}key", prefix), "v").await.unwrap();

    let descriptor = BackendDescriptor::new("valkey", BackendConfig::Redis(config));
    RedisPurger::new(1000).purge(&descriptor).await.unwrap();

    let exists: bool = conn.exists(format!("{}key", prefix)).await.unwrap();
    assert!(!exists);
}

#[tokio::test]
async fn test_unreachable_server_fails_purge() {
    let mut config = test_store("muc_");
    config.server = "127.0.0.1:1".parse().unwrap();
    let descriptor = BackendDescriptor::new("valkey", BackendConfig::Redis(config));

    assert!(RedisPurger::new(300).purge(&descriptor).await.is_err());
}

#[tokio::test]
#[serial]
async fn test_purge_removes_non_utf8_keys() {
    let prefix = generate_unique_prefix("muc");
    let config = test_store(&prefix);
    let Some(mut conn) = connect(&config).await else {
        return;
    };

    let mut binary_key = prefix.as_bytes().to_vec();
    binary_key.extend_from_slice(&[0xff, 0xfe, 0x00, 0x80]);
    let _: () = conn.set(&binary_key, "stale").await.unwrap();
    let _: () = conn.set(format!("{}text", prefix), "stale").await.unwrap();

    let removed = RedisPurger::new(1000).purge_prefix(&config).await.unwrap();
    assert_eq!(removed, 2);

    let exists: bool = conn.exists(&binary_key).await.unwrap();
    assert!(!exists);
}
