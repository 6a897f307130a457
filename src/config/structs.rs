use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{LinkvaultError, Result};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "linkvault.toml";

/// 静态配置（从 TOML 和环境变量加载，启动时使用）
///
/// - storage: 存储后端选择与数据库连接参数
/// - links: 短链接 ID 生成参数
/// - deletion: 批量删除的阈值与刷新间隔
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StaticConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub deletion: DeletionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：DATABASE_DSN / FILE_STORAGE_PATH > LV__* ENV > TOML 文件 > 默认值
    /// 示例：LV__DELETION__BATCH_SIZE=20
    pub fn load(path: Option<&str>) -> Result<Self> {
        use config::{Config, Environment, File};

        let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("LV")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("storage.database_url", non_empty_env("DATABASE_DSN"))
            .and_then(|b| {
                b.set_override_option("storage.file_path", non_empty_env("FILE_STORAGE_PATH"))
            })
            .map_err(|e| LinkvaultError::config(format!("Invalid override: {}", e)))?;

        builder
            .build()
            .and_then(|settings| settings.try_deserialize::<StaticConfig>())
            .map_err(|e| LinkvaultError::config(format!("Failed to load '{}': {}", path, e)))
    }

    /// Reject values the core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.links.id_length < MIN_ID_LENGTH {
            return Err(LinkvaultError::config(format!(
                "links.id_length must be at least {}, got {}",
                MIN_ID_LENGTH, self.links.id_length
            )));
        }
        if self.deletion.batch_size == 0 {
            return Err(LinkvaultError::config("deletion.batch_size must be positive"));
        }
        if self.deletion.flush_interval_ms == 0 {
            return Err(LinkvaultError::config(
                "deletion.flush_interval_ms must be positive",
            ));
        }
        Ok(())
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("# Error generating sample config: {}", e))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

const MIN_ID_LENGTH: usize = 4;

/// Which storage backend the process runs on, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageSelection {
    Memory,
    File(PathBuf),
    Database(String),
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Relational connection string; wins over `file_path` when non-empty.
    #[serde(default)]
    pub database_url: String,
    /// Append-only log file; used when `database_url` is empty.
    #[serde(default)]
    pub file_path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl StorageConfig {
    pub fn selection(&self) -> StorageSelection {
        let database_url = self.database_url.trim();
        let file_path = self.file_path.trim();

        if !database_url.is_empty() {
            StorageSelection::Database(database_url.to_string())
        } else if !file_path.is_empty() {
            StorageSelection::File(PathBuf::from(file_path))
        } else {
            StorageSelection::Memory
        }
    }
}

/// 短链接配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinksConfig {
    #[serde(default = "default_id_length")]
    pub id_length: usize,
}

/// 批量删除配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeletionConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl DeletionConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
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
// Default value functions
// ============================================================

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

fn default_id_length() -> usize {
    10
}

fn default_batch_size() -> usize {
    10
}

fn default_flush_interval_ms() -> u64 {
    3000
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

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            file_path: String::new(),
            pool_size: default_pool_size(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            id_length: default_id_length(),
        }
    }
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_prefers_database() {
        let storage = StorageConfig {
            database_url: "sqlite://links.db".into(),
            file_path: "links.jsonl".into(),
            ..Default::default()
        };
        assert_eq!(
            storage.selection(),
            StorageSelection::Database("sqlite://links.db".into())
        );
    }

    #[test]
    fn test_selection_falls_back_to_file_then_memory() {
        let mut storage = StorageConfig {
            file_path: " links.jsonl ".into(),
            ..Default::default()
        };
        assert_eq!(
            storage.selection(),
            StorageSelection::File(PathBuf::from("links.jsonl"))
        );

        storage.file_path.clear();
        assert_eq!(storage.selection(), StorageSelection::Memory);
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = StaticConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.deletion.batch_size, 10);
        assert_eq!(config.deletion.flush_interval(), Duration::from_secs(3));
        assert_eq!(config.links.id_length, 10);
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = StaticConfig::default();
        config.deletion.batch_size = 0;
        assert!(matches!(config.validate(), Err(LinkvaultError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_short_ids() {
        let mut config = StaticConfig::default();
        config.links.id_length = 2;
        assert!(matches!(config.validate(), Err(LinkvaultError::Config(_))));
    }

    #[test]
    fn test_sample_config_round_trips() {
        let sample = StaticConfig::generate_sample_config();
        assert!(sample.contains("[deletion]"));
        let parsed: StaticConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed, StaticConfig::default());
    }
}
