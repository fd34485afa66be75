//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 缓存清理测试

#[path = "../common/mod.rs"]
mod common;

use common::{redis_store, FakeRegistry};
use tokio::time::Duration;
use valkey_muc::error::ProvisionError;
use valkey_muc::provision::CacheInvalidator;
use valkey_muc::registry::{BackendConfig, BackendDescriptor, CacheMode, RegistryState};

const TIMEOUT: Duration = Duration::from_secs(5);

fn three_store_state() -> RegistryState {
    let mut state = RegistryState::bootstrap("/var/moodledata");
    state
        .stores
        .insert("valkey".to_string(), redis_store("valkey", "valkey", 6379));
    state.stores.insert(
        "scratch".to_string(),
        BackendDescriptor::new("scratch", BackendConfig::Memory),
    );
    state.mappings.set(
        CacheMode::Application,
        vec!["default_application".to_string(), "valkey".to_string()],
    );
    state
        .mappings
        .set(CacheMode::Session, vec!["scratch".to_string()]);
    state
        .mappings
        .set(CacheMode::Request, vec!["scratch".to_string()]);
    state
}

#[tokio::test]
async fn test_second_of_three_failing_does_not_stop_the_third() {
    let state = three_store_state();
    let registry = FakeRegistry::with_state(state.clone());
    registry.fail_purge_of("valkey");

    let report = CacheInvalidator::new(&registry, TIMEOUT)
        .purge_mapped(&state)
        .await;

    let order: Vec<&str> = report.outcomes.iter().map(|o| o.store.as_str()).collect();
    assert_eq!(order, vec!["default_application", "valkey", "scratch"]);
    assert_eq!(registry.purged(), vec!["default_application", "scratch"]);

    assert!(!report.is_success());
    let errors = report.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        ProvisionError::Purge { store, reason }
            if store == "valkey" && reason == "connection refused"
    ));
}

#[tokio::test]
async fn test_unmapped_stores_are_left_alone() {
    let state = three_store_state();
    let registry = FakeRegistry::with_state(state);

    let report = CacheInvalidator::new(&registry, TIMEOUT)
        .purge_all()
        .await
        .unwrap();

    assert!(report.is_success());
    let purged = registry.purged();
    assert!(!purged.contains(&"default_session".to_string()));
    assert!(!purged.contains(&"default_request".to_string()));
}

#[tokio::test]
async fn test_purge_all_requires_readable_registry() {
    let registry = FakeRegistry::new();
    registry.fail_load_with("io error");

    let result = CacheInvalidator::new(&registry, TIMEOUT).purge_all().await;
    assert!(matches!(result, Err(ProvisionError::ConfigAccess(_))));
    assert!(registry.purged().is_empty());
}
