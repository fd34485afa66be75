//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具函数和内存注册表替身。

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;
use valkey_muc::config::ProvisionConfig;
use valkey_muc::error::{ProvisionError, Result};
use valkey_muc::registry::{
    BackendConfig, BackendDescriptor, ModeMappings, RedisStoreConfig, RegistryClient,
    RegistryState,
};

static INIT: Once = Once::new();

pub fn setup_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(EnvFilter::new("debug"))
            .try_init()
            .ok();
    });
}

/// 测试用配置：默认值，不读取进程环境变量
pub fn test_config() -> ProvisionConfig {
    ProvisionConfig::load_with(None, |_| None).expect("default configuration is valid")
}

pub fn redis_store(name: &str, host: &str, port: u16) -> BackendDescriptor {
    BackendDescriptor::new(
        name,
        BackendConfig::Redis(RedisStoreConfig {
            server: format!("{}:{}", host, port).parse().expect("valid target"),
            password: None,
            prefix: "muc_".to_string(),
            database: 1,
            serializer: Default::default(),
            compressor: Default::default(),
        }),
    )
}

/// 内存中的注册表替身，支持故障注入
///
/// 版本校验和写入语义与文件注册表一致
pub struct FakeRegistry {
    state: Mutex<RegistryState>,
    fail_load: Mutex<Option<String>>,
    fail_create: Mutex<Option<String>>,
    fail_purge: Mutex<HashSet<String>>,
    slow_load: Mutex<Option<Duration>>,
    slow_create: Mutex<Option<Duration>>,
    slow_purge: Mutex<Option<(String, Duration)>>,
    // 在下一次写入前插入一次外部修改
    interfere_next_write: Mutex<bool>,
    create_calls: AtomicUsize,
    mapping_calls: AtomicUsize,
    purged: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::with_state(RegistryState::bootstrap("/var/moodledata"))
    }

    pub fn with_state(state: RegistryState) -> Self {
        Self {
            state: Mutex::new(state),
            fail_load: Mutex::new(None),
            fail_create: Mutex::new(None),
            fail_purge: Mutex::new(HashSet::new()),
            slow_load: Mutex::new(None),
            slow_create: Mutex::new(None),
            slow_purge: Mutex::new(None),
            interfere_next_write: Mutex::new(false),
            create_calls: AtomicUsize::new(0),
            mapping_calls: AtomicUsize::new(0),
            purged: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_load_with(&self, reason: &str) {
        *self.fail_load.lock().unwrap() = Some(reason.to_string());
    }

    pub fn fail_create_with(&self, reason: &str) {
        *self.fail_create.lock().unwrap() = Some(reason.to_string());
    }

    pub fn fail_purge_of(&self, store: &str) {
        self.fail_purge.lock().unwrap().insert(store.to_string());
    }

    pub fn slow_load_by(&self, delay: Duration) {
        *self.slow_load.lock().unwrap() = Some(delay);
    }

    pub fn slow_create_by(&self, delay: Duration) {
        *self.slow_create.lock().unwrap() = Some(delay);
    }

    pub fn slow_purge_of(&self, store: &str, delay: Duration) {
        *self.slow_purge.lock().unwrap() = Some((store.to_string(), delay));
    }

    pub fn interfere_before_next_write(&self) {
        *self.interfere_next_write.lock().unwrap() = true;
    }

    pub fn snapshot(&self) -> RegistryState {
        self.state.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn mapping_calls(&self) -> usize {
        self.mapping_calls.load(Ordering::SeqCst)
    }

    pub fn purged(&self) -> Vec<String> {
        self.purged.lock().unwrap().clone()
    }

    fn check_version(&self, state: &mut RegistryState, expected: u64) -> Result<()> {
        let mut interfere = self.interfere_next_write.lock().unwrap();
        if *interfere {
            *interfere = false;
            state.version += 1;
        }
        if state.version != expected {
            return Err(ProvisionError::ConcurrentModification {
                expected,
                actual: state.version,
            });
        }
        Ok(())
    }
}

impl Default for FakeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn load(&self) -> Result<RegistryState> {
        let delay = *self.slow_load.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.fail_load.lock().unwrap().clone() {
            return Err(ProvisionError::ConfigAccess(reason));
        }
        Ok(self.snapshot())
    }

    async fn create_store(
        &self,
        descriptor: BackendDescriptor,
        expected_version: u64,
    ) -> Result<BackendDescriptor> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.slow_create.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.fail_create.lock().unwrap().clone() {
            return Err(ProvisionError::Registration(reason));
        }
        let mut state = self.state.lock().unwrap();
        self.check_version(&mut state, expected_version)?;
        if state.contains(&descriptor.name) {
            return Err(ProvisionError::Registration(format!(
                "store '{}' is already registered",
                descriptor.name
            )));
        }
        state
            .stores
            .insert(descriptor.name.clone(), descriptor.clone());
        state.version += 1;
        Ok(descriptor)
    }

    async fn set_mappings(&self, mappings: ModeMappings, expected_version: u64) -> Result<u64> {
        self.mapping_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        self.check_version(&mut state, expected_version)?;
        mappings.validate_against(&state.stores)?;
        state.mappings = mappings;
        state.version += 1;
        Ok(state.version)
    }

    async fn purge_store(&self, descriptor: &BackendDescriptor) -> Result<()> {
        let delay = self
            .slow_purge
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(store, _)| *store == descriptor.name)
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_purge.lock().unwrap().contains(&descriptor.name) {
            return Err(ProvisionError::Purge {
                store: descriptor.name.clone(),
                reason: "connection refused".to_string(),
            });
        }
        self.purged.lock().unwrap().push(descriptor.name.clone());
        Ok(())
    }
}

/// 生成带随机后缀的键前缀，避免测试之间互相干扰
pub fn generate_unique_prefix(base: &str) -> String {
    format!("{}_", valkey_muc::utils::generate_unique_name(base))
}
