//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存注册表的数据模型：存储描述、模式映射和注册表状态。

use crate::error::{ProvisionError, Result};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv6Addr;
use std::path::PathBuf;
use std::str::FromStr;

lazy_static! {
    static ref STORE_NAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
    static ref KEY_PREFIX_RE: Regex = Regex::new(r"^[A-Za-z0-9_:.\-]*$").unwrap();
}

/// 存储名称的最大长度
pub const MAX_STORE_NAME_LENGTH: usize = 64;

/// 宿主默认的应用级存储
pub const DEFAULT_APPLICATION_STORE: &str = "default_application";
/// 宿主默认的会话级存储
pub const DEFAULT_SESSION_STORE: &str = "default_session";
/// 宿主默认的请求级存储
pub const DEFAULT_REQUEST_STORE: &str = "default_request";

/// 逻辑缓存模式
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// 应用级缓存，所有请求共享
    Application,
    /// 会话级缓存
    Session,
    /// 请求级缓存，生命周期为单个请求
    Request,
}

impl CacheMode {
    /// 全部模式，按固定顺序排列
    pub const ALL: [CacheMode; 3] = [
        CacheMode::Application,
        CacheMode::Session,
        CacheMode::Request,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheMode::Application => "application",
            CacheMode::Session => "session",
            CacheMode::Request => "request",
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CacheMode {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "application" => Ok(CacheMode::Application),
            "session" => Ok(CacheMode::Session),
            "request" => Ok(CacheMode::Request),
            other => Err(ProvisionError::Config(format!("Unknown cache mode '{}'", other))),
        }
    }
}

/// 存储实现类型
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Redis 兼容的网络存储（Valkey / Redis）
    Redis,
    /// 本地文件存储
    File,
    /// 进程内存储
    Memory,
}

impl BackendKind {
    /// 是否通过网络访问
    pub fn is_network(&self) -> bool {
        matches!(self, BackendKind::Redis)
    }

    /// 该类型能够服务的模式
    pub fn supports(&self, mode: CacheMode) -> bool {
        match self {
            BackendKind::Redis | BackendKind::File => mode != CacheMode::Request,
            BackendKind::Memory => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Redis => "redis",
            BackendKind::File => "file",
            BackendKind::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// 值序列化方式
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SerializerMode {
    /// 宿主语言原生序列化
    #[default]
    Native,
    /// 紧凑二进制序列化
    CompactBinary,
}

impl SerializerMode {
    /// 宿主缓存配置中使用的数值编码
    pub fn code(&self) -> u8 {
        match self {
            SerializerMode::Native => 1,
            SerializerMode::CompactBinary => 2,
        }
    }
}

/// 存储前的压缩方式
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// 不压缩
    #[default]
    None,
    /// 通用压缩
    Gzip,
    /// 快速压缩
    Zstd,
}

impl CompressionMode {
    /// 宿主缓存配置中使用的数值编码
    pub fn code(&self) -> u8 {
        match self {
            CompressionMode::None => 0,
            CompressionMode::Gzip => 1,
            CompressionMode::Zstd => 2,
        }
    }
}

/// 网络存储的连接目标（host:port）
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectionTarget {
    host: String,
    port: u16,
}

impl ConnectionTarget {
    /// 创建连接目标，主机名不能为空，端口不能为0
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        let host = host.trim();
        if host.is_empty() {
            return Err(ProvisionError::Registration(
                "connection target host cannot be empty".to_string(),
            ));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(ProvisionError::Registration(format!(
                "connection target host '{}' contains whitespace",
                host
            )));
        }
        if port == 0 {
            return Err(ProvisionError::Registration(
                "connection target port cannot be zero".to_string(),
            ));
        }
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.contains(':') && host.parse::<Ipv6Addr>().is_err() {
            return Err(ProvisionError::Registration(format!(
                "connection target host '{}' contains ':' but is not an IPv6 address",
                host
            )));
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for ConnectionTarget {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            // [::1]:6379
            let (host, tail) = rest.split_once(']').ok_or_else(|| {
                ProvisionError::Registration(format!("malformed connection target '{}'", s))
            })?;
            let port = tail.strip_prefix(':').ok_or_else(|| {
                ProvisionError::Registration(format!("connection target '{}' has no port", s))
            })?;
            (host, port)
        } else {
            s.rsplit_once(':').ok_or_else(|| {
                ProvisionError::Registration(format!("connection target '{}' has no port", s))
            })?
        };

        if host.contains(':') && !s.starts_with('[') {
            return Err(ProvisionError::Registration(format!(
                "IPv6 connection target '{}' must be bracketed",
                s
            )));
        }

        let port: u16 = port.parse().map_err(|_| {
            ProvisionError::Registration(format!("invalid port '{}' in connection target", port))
        })?;
        ConnectionTarget::new(host, port)
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl TryFrom<String> for ConnectionTarget {
    type Error = ProvisionError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ConnectionTarget> for String {
    fn from(value: ConnectionTarget) -> Self {
        value.to_string()
    }
}

fn serialize_password<S: Serializer>(
    password: &Option<SecretString>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match password {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

/// Redis 兼容存储配置
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RedisStoreConfig {
    /// 服务地址
    pub server: ConnectionTarget,
    /// 认证密码
    #[serde(
        default,
        serialize_with = "serialize_password",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<SecretString>,
    /// 键前缀
    #[serde(default)]
    pub prefix: String,
    /// 数据库编号，与会话所用的库分开
    #[serde(default = "default_store_database")]
    pub database: u8,
    /// 序列化方式
    #[serde(default)]
    pub serializer: SerializerMode,
    /// 压缩方式
    #[serde(default)]
    pub compressor: CompressionMode,
}

fn default_store_database() -> u8 {
    1
}

impl RedisStoreConfig {
    /// 比较两份配置是否等价（包括密码）
    pub fn same_settings(&self, other: &RedisStoreConfig) -> bool {
        let password = |c: &RedisStoreConfig| {
            c.password
                .as_ref()
                .map(|p| p.expose_secret().to_string())
        };
        self.server == other.server
            && password(self) == password(other)
            && self.prefix == other.prefix
            && self.database == other.database
            && self.serializer == other.serializer
            && self.compressor == other.compressor
    }
}

/// 文件存储配置
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileStoreConfig {
    /// 缓存目录
    pub path: PathBuf,
}

/// 按存储类型区分的强类型配置
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Redis(RedisStoreConfig),
    File(FileStoreConfig),
    Memory,
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Redis(_) => BackendKind::Redis,
            BackendConfig::File(_) => BackendKind::File,
            BackendConfig::Memory => BackendKind::Memory,
        }
    }

    /// 比较两份配置是否等价
    pub fn same_settings(&self, other: &BackendConfig) -> bool {
        match (self, other) {
            (BackendConfig::Redis(a), BackendConfig::Redis(b)) => a.same_settings(b),
            (BackendConfig::File(a), BackendConfig::File(b)) => a == b,
            (BackendConfig::Memory, BackendConfig::Memory) => true,
            _ => false,
        }
    }
}

/// 已配置的缓存存储
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BackendDescriptor {
    /// 注册表内唯一的名称
    pub name: String,
    /// 没有显式映射时是否可被自动选中
    #[serde(default)]
    pub is_default: bool,
    /// 类型及其配置
    pub config: BackendConfig,
}

impl BackendDescriptor {
    pub fn new(name: impl Into<String>, config: BackendConfig) -> Self {
        Self {
            name: name.into(),
            is_default: false,
            config,
        }
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn kind(&self) -> BackendKind {
        self.config.kind()
    }

    /// 连接目标，非网络存储返回 None
    pub fn connection_target(&self) -> Option<&ConnectionTarget> {
        match &self.config {
            BackendConfig::Redis(redis) => Some(&redis.server),
            _ => None,
        }
    }

    /// 比较名称、默认标记和配置是否等价
    pub fn same_as(&self, other: &BackendDescriptor) -> bool {
        self.name == other.name
            && self.is_default == other.is_default
            && self.config.same_settings(&other.config)
    }

    /// 校验存储定义
    ///
    /// 名称必须非空且只包含字母、数字和下划线；Redis 键前缀只允许安全字符
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ProvisionError::Registration(
                "store name cannot be empty".to_string(),
            ));
        }
        if self.name.len() > MAX_STORE_NAME_LENGTH {
            return Err(ProvisionError::Registration(format!(
                "store name '{}' exceeds maximum length of {} characters",
                self.name, MAX_STORE_NAME_LENGTH
            )));
        }
        if !STORE_NAME_RE.is_match(&self.name) {
            return Err(ProvisionError::Registration(format!(
                "store name '{}' may only contain letters, digits and underscores",
                self.name
            )));
        }
        match &self.config {
            BackendConfig::Redis(redis) => {
                if !KEY_PREFIX_RE.is_match(&redis.prefix) {
                    return Err(ProvisionError::Registration(format!(
                        "key prefix '{}' contains unsupported characters",
                        redis.prefix
                    )));
                }
                if redis.database > 15 {
                    return Err(ProvisionError::Registration(format!(
                        "database index {} is out of range (0-15)",
                        redis.database
                    )));
                }
            }
            BackendConfig::File(file) => {
                if file.path.as_os_str().is_empty() {
                    return Err(ProvisionError::Registration(format!(
                        "file store '{}' has an empty path",
                        self.name
                    )));
                }
            }
            BackendConfig::Memory => {}
        }
        Ok(())
    }
}

/// 模式到存储的映射表，每个模式按优先级排列
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ModeMappings {
    #[serde(default)]
    pub application: Vec<String>,
    #[serde(default)]
    pub session: Vec<String>,
    #[serde(default)]
    pub request: Vec<String>,
}

impl ModeMappings {
    pub fn get(&self, mode: CacheMode) -> &[String] {
        match mode {
            CacheMode::Application => &self.application,
            CacheMode::Session => &self.session,
            CacheMode::Request => &self.request,
        }
    }

    /// 整体替换某个模式的存储列表
    pub fn set(&mut self, mode: CacheMode, stores: Vec<String>) {
        match mode {
            CacheMode::Application => self.application = stores,
            CacheMode::Session => self.session = stores,
            CacheMode::Request => self.request = stores,
        }
    }

    /// 当前被映射的存储（去重，按模式顺序和优先级排列）
    pub fn mapped_stores(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for mode in CacheMode::ALL {
            for name in self.get(mode) {
                if !seen.contains(&name.as_str()) {
                    seen.push(name);
                }
            }
        }
        seen
    }

    /// 校验映射表的不变量
    ///
    /// - 每个模式至少映射一个存储
    /// - 映射的存储必须已注册且支持该模式
    /// - 请求级模式不能映射到网络存储
    pub fn validate_against(&self, stores: &BTreeMap<String, BackendDescriptor>) -> Result<()> {
        for mode in CacheMode::ALL {
            let names = self.get(mode);
            if names.is_empty() {
                return Err(ProvisionError::MappingIntegrity(format!(
                    "mode '{}' would be left without a store",
                    mode
                )));
            }
            for (idx, name) in names.iter().enumerate() {
                if names[..idx].contains(name) {
                    return Err(ProvisionError::MappingIntegrity(format!(
                        "store '{}' is listed more than once for mode '{}'",
                        name, mode
                    )));
                }
                let descriptor = stores.get(name).ok_or_else(|| {
                    ProvisionError::MappingIntegrity(format!(
                        "mode '{}' references unknown store '{}'",
                        mode, name
                    ))
                })?;
                let kind = descriptor.kind();
                if mode == CacheMode::Request && kind.is_network() {
                    return Err(ProvisionError::MappingIntegrity(format!(
                        "request mode cannot use network store '{}' ({})",
                        name, kind
                    )));
                }
                if !kind.supports(mode) {
                    return Err(ProvisionError::MappingIntegrity(format!(
                        "store '{}' ({}) does not support mode '{}'",
                        name, kind, mode
                    )));
                }
            }
        }
        Ok(())
    }
}

/// 注册表完整状态，由宿主持有
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RegistryState {
    /// 每次成功写入加一
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mappings: ModeMappings,
    #[serde(default)]
    pub stores: BTreeMap<String, BackendDescriptor>,
}

impl RegistryState {
    /// 全新安装时的注册表：三个宿主默认存储及其映射
    pub fn bootstrap(dataroot: impl Into<PathBuf>) -> Self {
        let dataroot = dataroot.into();
        let mut stores = BTreeMap::new();
        stores.insert(
            DEFAULT_APPLICATION_STORE.to_string(),
            BackendDescriptor::new(
                DEFAULT_APPLICATION_STORE,
                BackendConfig::File(FileStoreConfig {
                    path: dataroot.join("cache"),
                }),
            )
            .with_default(true),
        );
        stores.insert(
            DEFAULT_SESSION_STORE.to_string(),
            BackendDescriptor::new(DEFAULT_SESSION_STORE, BackendConfig::Memory).with_default(true),
        );
        stores.insert(
            DEFAULT_REQUEST_STORE.to_string(),
            BackendDescriptor::new(DEFAULT_REQUEST_STORE, BackendConfig::Memory).with_default(true),
        );

        Self {
            version: 0,
            updated_at: None,
            mappings: ModeMappings {
                application: vec![DEFAULT_APPLICATION_STORE.to_string()],
                session: vec![DEFAULT_SESSION_STORE.to_string()],
                request: vec![DEFAULT_REQUEST_STORE.to_string()],
            },
            stores,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&BackendDescriptor> {
        self.stores.get(name)
    }

    /// 校验映射表相对于当前存储集合的不变量
    pub fn check_integrity(&self) -> Result<()> {
        self.mappings.validate_against(&self.stores)
    }
}
