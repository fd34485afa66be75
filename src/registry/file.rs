//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 基于 TOML 文件的缓存注册表实现。

use crate::backend::{DefaultStorePurger, StorePurger};
use crate::error::{ProvisionError, Result};
use crate::registry::model::{BackendDescriptor, ModeMappings, RegistryState};
use crate::registry::RegistryClient;
use async_trait::async_trait;
use chrono::Utc;
use fd_lock::RwLock;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

/// 文件注册表
///
/// 文件不存在时视为全新安装，返回 [`RegistryState::bootstrap`]。
/// 每次写入都在同目录 `<文件名>.lock` 的排他锁内完成“读取 → 版本校验 → 替换”，
/// 多个进程或多个实例写同一文件时，同一版本只有一个写入者能成功。
/// 新内容先写到唯一命名的临时文件再重命名，读者不会看到写了一半的文件。
pub struct FileRegistry {
    path: PathBuf,
    dataroot: PathBuf,
    purger: Arc<dyn StorePurger>,
}

impl FileRegistry {
    /// # 参数
    ///
    /// * `path` - 注册表文件路径
    /// * `dataroot` - 宿主数据目录，用于默认文件存储
    /// * `connection_timeout_ms` - 清理网络存储时的连接超时（毫秒）
    pub fn new(
        path: impl Into<PathBuf>,
        dataroot: impl Into<PathBuf>,
        connection_timeout_ms: u64,
    ) -> Self {
        Self::with_purger(
            path,
            dataroot,
            Arc::new(DefaultStorePurger::new(connection_timeout_ms)),
        )
    }

    /// 使用指定的清理器创建注册表
    pub fn with_purger(
        path: impl Into<PathBuf>,
        dataroot: impl Into<PathBuf>,
        purger: Arc<dyn StorePurger>,
    ) -> Self {
        Self {
            path: path.into(),
            dataroot: dataroot.into(),
            purger,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 写锁文件路径
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    async fn read_state(&self) -> Result<RegistryState> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(ProvisionError::ConfigAccess(format!(
                    "cannot read registry {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        parse_state(&self.path, &self.dataroot, contents)
    }

    /// 在写锁内读取最新状态，校验版本后交给 `mutate` 修改并原子替换文件
    ///
    /// 版本号加一和 `updated_at` 由这里统一维护。写盘失败用 `on_write_error` 构造错误。
    async fn update<T, F>(
        &self,
        expected_version: u64,
        on_write_error: fn(String) -> ProvisionError,
        mutate: F,
    ) -> Result<(T, u64)>
    where
        T: Send + 'static,
        F: FnOnce(&mut RegistryState) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let dataroot = self.dataroot.clone();
        let lock_path = self.lock_path();

        // flock 会阻塞线程，整段读-改-写放到阻塞线程池执行
        tokio::task::spawn_blocking(move || {
            if let Some(parent) = non_empty_parent(&path) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ProvisionError::ConfigAccess(format!(
                        "cannot create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }

            let lock_file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)
                .map_err(|e| {
                    ProvisionError::ConfigAccess(format!(
                        "cannot open lock file {}: {}",
                        lock_path.display(),
                        e
                    ))
                })?;
            let mut lock = RwLock::new(lock_file);
            let _guard = lock.write().map_err(|e| {
                ProvisionError::ConfigAccess(format!(
                    "cannot lock {}: {}",
                    lock_path.display(),
                    e
                ))
            })?;

            let contents = match std::fs::read_to_string(&path) {
                Ok(contents) => Some(contents),
                Err(e) if e.kind() == ErrorKind::NotFound => None,
                Err(e) => {
                    return Err(ProvisionError::ConfigAccess(format!(
                        "cannot read registry {}: {}",
                        path.display(),
                        e
                    )))
                }
            };
            let mut state = parse_state(&path, &dataroot, contents)?;
            if state.version != expected_version {
                return Err(ProvisionError::ConcurrentModification {
                    expected: expected_version,
                    actual: state.version,
                });
            }

            let value = mutate(&mut state)?;
            state.version += 1;
            state.updated_at = Some(Utc::now());

            write_state(&path, &state).map_err(on_write_error)?;
            Ok((value, state.version))
        })
        .await
        .map_err(|e| ProvisionError::ConfigAccess(format!("registry writer panicked: {}", e)))?
    }
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

fn parse_state(path: &Path, dataroot: &Path, contents: Option<String>) -> Result<RegistryState> {
    let Some(contents) = contents else {
        debug!(
            "Registry file {} not found, using bootstrap state",
            path.display()
        );
        return Ok(RegistryState::bootstrap(dataroot));
    };

    let state: RegistryState = toml::from_str(&contents).map_err(|e| {
        ProvisionError::ConfigAccess(format!(
            "cannot parse registry {}: {}",
            path.display(),
            e
        ))
    })?;

    if let Err(e) = state.check_integrity() {
        warn!("Registry {} is inconsistent: {}", path.display(), e);
    }
    Ok(state)
}

fn write_state(path: &Path, state: &RegistryState) -> std::result::Result<(), String> {
    let contents = toml::to_string_pretty(state).map_err(|e| e.to_string())?;
    let dir = non_empty_parent(path).unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| format!("cannot create temporary file in {}: {}", dir.display(), e))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| format!("cannot write {}: {}", tmp.path().display(), e))?;
    tmp.persist(path)
        .map_err(|e| format!("cannot replace {}: {}", path.display(), e))?;
    Ok(())
}

#[async_trait]
impl RegistryClient for FileRegistry {
    #[instrument(skip(self), level = "debug", fields(path = %self.path.display()))]
    async fn load(&self) -> Result<RegistryState> {
        self.read_state().await
    }

    #[instrument(skip(self, descriptor), level = "debug", fields(store = %descriptor.name))]
    async fn create_store(
        &self,
        descriptor: BackendDescriptor,
        expected_version: u64,
    ) -> Result<BackendDescriptor> {
        descriptor.validate()?;
        let name = descriptor.name.clone();

        let (persisted, version) = self
            .update(expected_version, ProvisionError::Registration, move |state| {
                if state.contains(&descriptor.name) {
                    return Err(ProvisionError::Registration(format!(
                        "store '{}' is already registered",
                        descriptor.name
                    )));
                }
                state
                    .stores
                    .insert(descriptor.name.clone(), descriptor.clone());
                Ok(descriptor)
            })
            .await?;

        debug!(version, "Store '{}' persisted", name);
        Ok(persisted)
    }

    #[instrument(skip(self, mappings), level = "debug")]
    async fn set_mappings(&self, mappings: ModeMappings, expected_version: u64) -> Result<u64> {
        let ((), version) = self
            .update(expected_version, ProvisionError::ConfigAccess, move |state| {
                mappings.validate_against(&state.stores)?;
                state.mappings = mappings;
                Ok(())
            })
            .await?;

        debug!(version, "Mappings persisted");
        Ok(version)
    }

    async fn purge_store(&self, descriptor: &BackendDescriptor) -> Result<()> {
        self.purger.purge(descriptor).await
    }
}
