//! Client configuration module / 客户端配置模块
//!
//! Configuration is loaded from `config.json` (or the file named by
//! `GCS_CLIENT_CONFIG`). A default file is created on first run.

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::client::{DEFAULT_API_ENDPOINT, DEFAULT_UPLOAD_ENDPOINT};
use crate::credentials::{Scope, DEFAULT_TOKEN_URI};
use crate::error::{GcsError, Result};
use crate::retry::RetryParams;
use crate::storage::DEFAULT_CHUNK_SIZE;

/// Environment variable overriding the config path / 配置文件路径环境变量
pub const CONFIG_ENV: &str = "GCS_CLIENT_CONFIG";

/// Global configuration instance / 全局配置实例
static CONFIG: OnceCell<Arc<RwLock<ClientConfig>>> = OnceCell::new();

/// Client configuration / 客户端配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How requests are authorized / 认证方式
    pub credentials: CredentialsConfig,
    /// Transfer chunk size in bytes / 传输分片大小（字节）
    pub chunk_size: usize,
    /// Default retry policy / 默认重试策略
    pub retry: RetryParams,
    /// API endpoints / API地址
    pub endpoints: EndpointsConfig,
    /// HTTP transport settings / HTTP传输配置
    pub http: HttpConfig,
}

/// Credentials source / 凭据来源
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsConfig {
    /// Anonymous; remote calls fail until credentials are set / 未配置
    #[default]
    None,
    /// Fixed access token / 固定访问令牌
    Token { token: String },
    /// Service account JSON key / 服务账号密钥
    ServiceAccount {
        key_file: PathBuf,
        #[serde(default)]
        scope: Scope,
    },
    /// OAuth refresh token / OAuth刷新令牌
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        #[serde(default = "default_token_uri")]
        token_uri: String,
    },
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Endpoint configuration / 地址配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// JSON API base / JSON API地址
    pub api: String,
    /// Upload API base / 上传API地址
    pub upload: String,
}

/// HTTP configuration / HTTP配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds / 单次请求超时（秒）
    pub timeout_secs: Option<u64>,
    /// Proxy URL / 代理地址
    pub proxy: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            credentials: CredentialsConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryParams::default(),
            endpoints: EndpointsConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            api: DEFAULT_API_ENDPOINT.to_string(),
            upload: DEFAULT_UPLOAD_ENDPOINT.to_string(),
        }
    }
}

/// Get the config file path / 获取配置文件路径
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file / 从文件加载配置
pub fn load_config(path: &Path) -> Result<ClientConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| GcsError::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

    let config: ClientConfig = serde_json::from_str(&content)
        .map_err(|e| GcsError::Config(format!("Failed to parse config file {:?}: {}", path, e)))?;

    tracing::info!("Loaded configuration from {:?}", path);
    Ok(config)
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(path: &Path, config: &ClientConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| GcsError::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(path, content)
        .map_err(|e| GcsError::Config(format!("Failed to write config file {:?}: {}", path, e)))?;

    Ok(())
}

/// Load configuration, or create the default if missing / 加载配置，不存在则创建默认配置
pub fn load_or_create(path: &Path) -> Result<ClientConfig> {
    if path.exists() {
        load_config(path)
    } else {
        let config = ClientConfig::default();
        save_config(path, &config)?;
        tracing::info!("Created default configuration at {:?}", path);
        Ok(config)
    }
}

/// Initialize global configuration / 初始化全局配置
pub fn init_config() -> Result<Arc<RwLock<ClientConfig>>> {
    let config = load_or_create(&get_config_path())?;

    let config_arc = Arc::new(RwLock::new(config));

    CONFIG
        .set(config_arc.clone())
        .map_err(|_| GcsError::Config("Config already initialized".to_string()))?;

    Ok(config_arc)
}

/// Get global configuration instance / 获取全局配置实例
pub fn get_config() -> Arc<RwLock<ClientConfig>> {
    CONFIG
        .get_or_init(|| {
            let config = load_config(&get_config_path()).unwrap_or_default();
            Arc::new(RwLock::new(config))
        })
        .clone()
}

/// Get a read-only snapshot of current config / 获取当前配置的只读快照
pub fn config() -> ClientConfig {
    get_config().read().clone()
}
