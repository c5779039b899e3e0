use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ShortenerError};

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 优先级：命令行参数 > ENV > config.toml > 默认值
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub deletion: DeletionConfig,
    #[serde(default)]
    pub shortener: ShortenerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// ENV 前缀：SHORTENER，分隔符：__
    /// 示例：SHORTENER__STORAGE__DATABASE_URL=postgres://...
    pub fn load(path: Option<&str>) -> Self {
        use config::{Config, Environment, File};

        let path = path.unwrap_or("config.toml");

        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("SHORTENER")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 校验取值范围；为 0 的间隔/超时会让后台 worker 或每次后端调用立即失败
    pub fn validate(&self) -> Result<()> {
        if self.storage.operation_timeout_ms == 0 {
            return Err(ShortenerError::database_config(
                "storage.operation_timeout_ms 必须大于 0",
            ));
        }
        if self.deletion.flush_interval_secs == 0 {
            return Err(ShortenerError::database_config(
                "deletion.flush_interval_secs 必须大于 0",
            ));
        }
        if self.deletion.flush_timeout_ms == 0 {
            return Err(ShortenerError::database_config(
                "deletion.flush_timeout_ms 必须大于 0",
            ));
        }
        Ok(())
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

/// HTTP 前端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_address")]
    pub address: String,
    /// 短链接前缀，例如 `https://sho.rt`；为空时使用请求的 Host
    #[serde(default)]
    pub base_url: Option<String>,
    /// 允许访问 /api/internal/stats 的 CIDR
    #[serde(default)]
    pub trusted_subnet: Option<String>,
}

/// 存储后端配置
///
/// database_url 非空 → 关系数据库；否则 file_storage_path 非空 → 日志文件；否则内存
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub file_storage_path: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// 每次后端调用的超时
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

impl StorageConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// 异步删除（debounce）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionConfig {
    /// 累计 key 数超过该值立即刷盘
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: usize,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// 单个 owner 的 UPDATE 事务超时
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenerConfig {
    /// 批量解码短 ID 的最大并发 worker 数；0 或 1 表示顺序解码
    #[serde(default = "default_max_decode_workers")]
    pub max_decode_workers: usize,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_operation_timeout_ms() -> u64 {
    5000
}

fn default_batch_threshold() -> usize {
    1000
}

fn default_flush_interval_secs() -> u64 {
    10
}

fn default_flush_timeout_ms() -> u64 {
    1000
}

fn default_max_decode_workers() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_server_address(),
            base_url: None,
            trusted_subnet: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            file_storage_path: None,
            pool_size: default_pool_size(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            batch_threshold: default_batch_threshold(),
            flush_interval_secs: default_flush_interval_secs(),
            flush_timeout_ms: default_flush_timeout_ms(),
        }
    }
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            max_decode_workers: default_max_decode_workers(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}
