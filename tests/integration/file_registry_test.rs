//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 文件注册表测试

#[path = "../common/mod.rs"]
mod common;

use async_trait::async_trait;
use common::{redis_store, test_config};
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::time::Duration;
use valkey_muc::backend::StorePurger;
use valkey_muc::error::{ProvisionError, Result};
use valkey_muc::provision::{NullReporter, ProvisionPlan, Provisioner};
use valkey_muc::registry::{
    BackendConfig, BackendDescriptor, CacheMode, FileRegistry, RegistryClient,
};

#[derive(Default)]
struct RecordingPurger {
    purged: Mutex<Vec<String>>,
}

#[async_trait]
impl StorePurger for RecordingPurger {
    async fn purge(&self, descriptor: &BackendDescriptor) -> Result<()> {
        self.purged.lock().unwrap().push(descriptor.name.clone());
        Ok(())
    }
}

fn registry_in(dir: &TempDir) -> FileRegistry {
    FileRegistry::new(dir.path().join("muc/registry.toml"), dir.path(), 500)
}

#[tokio::test]
async fn test_missing_file_loads_bootstrap_state() {
    let dir = TempDir::new().unwrap();
    let registry = registry_in(&dir);

    let state = registry.load().await.unwrap();
    assert_eq!(state.version, 0);
    assert_eq!(state.stores.len(), 3);
    assert_eq!(
        state.mappings.get(CacheMode::Application),
        ["default_application"]
    );
    match &state.get("default_application").unwrap().config {
        BackendConfig::File(file) => assert_eq!(file.path, dir.path().join("cache")),
        other => panic!("unexpected store config: {:?}", other),
    }
    // 只读不落盘
    assert!(!registry.path().exists());
}

#[tokio::test]
async fn test_created_store_persists_across_instances() {
    let dir = TempDir::new().unwrap();
    let mut store = redis_store("valkey", "valkey", 6379);
    if let BackendConfig::Redis(redis) = &mut store.config {
        redis.password = Some(SecretString::from("hunter2".to_string()));
    }

    let persisted = registry_in(&dir).create_store(store, 0).await.unwrap();
    assert_eq!(persisted.name, "valkey");
    assert!(registry_in(&dir).path().exists());

    let state = registry_in(&dir).load().await.unwrap();
    assert_eq!(state.version, 1);
    assert!(state.updated_at.is_some());
    match &state.get("valkey").unwrap().config {
        BackendConfig::Redis(redis) => {
            assert_eq!(redis.server.to_string(), "valkey:6379");
            assert_eq!(
                redis.password.as_ref().map(|p| p.expose_secret().to_string()),
                Some("hunter2".to_string())
            );
        }
        other => panic!("unexpected store config: {:?}", other),
    }
    assert!(state.check_integrity().is_ok());
}

#[tokio::test]
async fn test_duplicate_store_is_rejected() {
    let dir = TempDir::new().unwrap();
    let registry = registry_in(&dir);
    registry
        .create_store(redis_store("valkey", "valkey", 6379), 0)
        .await
        .unwrap();

    let err = registry
        .create_store(redis_store("valkey", "other-host", 6380), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Registration(_)));

    let state = registry.load().await.unwrap();
    assert_eq!(state.version, 1);
    assert_eq!(
        state.get("valkey").unwrap().connection_target().unwrap().host(),
        "valkey"
    );
}

#[tokio::test]
async fn test_stale_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let registry = registry_in(&dir);
    registry
        .create_store(redis_store("first", "valkey", 6379), 0)
        .await
        .unwrap();

    let err = registry
        .create_store(redis_store("second", "valkey", 6379), 0)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::ConcurrentModification {
            expected: 0,
            actual: 1
        }
    ));

    let mut mappings = registry.load().await.unwrap().mappings;
    mappings.set(CacheMode::Session, vec!["first".to_string()]);
    assert!(registry.set_mappings(mappings, 0).await.unwrap_err().is_conflict());
}

#[tokio::test]
async fn test_invalid_mappings_are_not_persisted() {
    let dir = TempDir::new().unwrap();
    let registry = registry_in(&dir);
    registry
        .create_store(redis_store("valkey", "valkey", 6379), 0)
        .await
        .unwrap();

    let mut mappings = registry.load().await.unwrap().mappings;
    mappings.set(CacheMode::Request, vec!["valkey".to_string()]);
    let err = registry.set_mappings(mappings, 1).await.unwrap_err();
    assert!(matches!(err, ProvisionError::MappingIntegrity(_)));

    let state = registry.load().await.unwrap();
    assert_eq!(state.version, 1);
    assert_eq!(state.mappings.get(CacheMode::Request), ["default_request"]);
}

#[tokio::test]
async fn test_corrupt_registry_is_a_config_access_error() {
    let dir = TempDir::new().unwrap();
    let registry = registry_in(&dir);
    std::fs::create_dir_all(registry.path().parent().unwrap()).unwrap();
    std::fs::write(registry.path(), "version = \"not a number\"").unwrap();

    assert!(matches!(
        registry.load().await,
        Err(ProvisionError::ConfigAccess(_))
    ));
}

#[tokio::test]
async fn test_file_store_purge_empties_cache_dir() {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");
    std::fs::create_dir_all(cache_dir.join("core")).unwrap();
    std::fs::write(cache_dir.join("core/entry.cache"), b"stale").unwrap();
    std::fs::write(cache_dir.join("top.cache"), b"stale").unwrap();

    let registry = registry_in(&dir);
    let state = registry.load().await.unwrap();
    registry
        .purge_store(state.get("default_application").unwrap())
        .await
        .unwrap();

    assert!(cache_dir.exists());
    assert_eq!(std::fs::read_dir(&cache_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_provision_twice_against_file_registry() {
    let dir = TempDir::new().unwrap();
    let purger = Arc::new(RecordingPurger::default());
    let registry = FileRegistry::with_purger(
        dir.path().join("muc/registry.toml"),
        dir.path(),
        purger.clone(),
    );
    let plan = ProvisionPlan::from_config(&test_config()).unwrap();
    let reporter = NullReporter;

    let first = Provisioner::new(&registry, plan.clone(), Duration::from_secs(5), &reporter)
        .run()
        .await
        .unwrap();
    assert!(first.registration.is_created());

    let second = Provisioner::new(&registry, plan, Duration::from_secs(5), &reporter)
        .run()
        .await
        .unwrap();
    assert!(!second.registration.is_created());
    assert!(second.is_success());

    let state = registry.load().await.unwrap();
    assert_eq!(state.stores.len(), 4);
    assert_eq!(state.mappings.get(CacheMode::Application), ["valkey"]);
    assert_eq!(state.mappings.get(CacheMode::Session), ["valkey"]);
    assert_eq!(state.mappings.get(CacheMode::Request), ["default_request"]);
    // 注册一次，映射两次
    assert_eq!(state.version, 3);
    // 第一次清理新旧共四个存储，第二次映射未变只清理两个
    assert_eq!(purger.purged.lock().unwrap().len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_on_separate_instances() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("muc/registry.toml");

    let mut handles = Vec::new();
    for i in 0..16 {
        let path = path.clone();
        let dataroot = dir.path().to_path_buf();
        handles.push(tokio::spawn(async move {
            let registry = FileRegistry::new(path, dataroot, 500);
            registry
                .create_store(redis_store(&format!("s{}", i), "valkey", 6379), 0)
                .await
        }));
    }

    let mut created = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(descriptor) => created.push(descriptor.name),
            Err(e) => assert!(e.is_conflict(), "unexpected error: {}", e),
        }
    }

    // 同一版本只允许一个写入者成功，且它的存储必须落盘
    assert_eq!(created.len(), 1);
    let state = FileRegistry::new(&path, dir.path(), 500).load().await.unwrap();
    assert_eq!(state.version, 1);
    assert_eq!(state.stores.len(), 4);
    assert!(state.contains(&created[0]));
}
