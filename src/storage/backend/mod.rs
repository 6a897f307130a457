//! SeaORM storage backend
//!
//! Relational storage for link records, supporting SQLite, MySQL/MariaDB and
//! PostgreSQL. The schema lives in the `migration` crate and is applied on
//! every start.

mod connection;
mod converters;
mod mutations;
mod query;
pub mod retry;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use super::{InsertOutcome, LinkRecord, LinkStore, StorageInfo};
use crate::config::StorageConfig;
use crate::errors::{LinkvaultError, Result};

pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use converters::{decode_owners, encode_owners, model_to_record, record_to_active_model};

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite:")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(LinkvaultError::database_config(format!(
            "Cannot infer database type from URL: {}. Supported: sqlite:, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// 规范化 backend 名称
pub fn normalize_backend_name(backend: &str) -> String {
    match backend {
        "mariadb" => "mysql".to_string(),
        "postgresql" => "postgres".to_string(),
        other => other.to_string(),
    }
}

/// SeaORM-based storage backend
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
    retry_config: retry::RetryConfig,
    closed: Arc<AtomicBool>,
}

impl SeaOrmStorage {
    pub async fn new(database_url: &str, backend_name: &str, config: &StorageConfig) -> Result<Self> {
        if database_url.is_empty() {
            return Err(LinkvaultError::database_config("database_url is empty"));
        }

        let backend_name = normalize_backend_name(backend_name);
        let retry_config = retry::RetryConfig {
            max_retries: config.retry_count,
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
        };

        let db = if backend_name == "sqlite" {
            connect_sqlite(database_url).await?
        } else {
            connect_generic(database_url, &backend_name, config.pool_size).await?
        };

        // 每次启动都运行迁移（幂等）
        run_migrations(&db).await?;

        Ok(SeaOrmStorage {
            db,
            backend_name,
            retry_config,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LinkvaultError::backend(operation, "storage is closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl LinkStore for SeaOrmStorage {
    fn info(&self) -> StorageInfo {
        StorageInfo {
            storage_type: self.backend_name.clone(),
            transactional_delete: true,
            persistent: true,
        }
    }

    async fn put(&self, record: LinkRecord) -> Result<()> {
        self.ensure_open("put")?;
        self.insert_record(&record).await
    }

    async fn put_batch(&self, records: Vec<LinkRecord>) -> Result<()> {
        self.ensure_open("put_batch")?;
        self.insert_records(&records).await
    }

    async fn get(&self, id: &str) -> Result<LinkRecord> {
        self.ensure_open("get")?;
        self.load_live(id)
            .await?
            .ok_or_else(|| LinkvaultError::not_found(format!("link '{}' not found", id)))
    }

    async fn find_by_base_url(&self, base_url: &str) -> Result<Option<LinkRecord>> {
        self.ensure_open("find_by_base_url")?;
        self.load_live_by_base_url(base_url).await
    }

    async fn add_owner(&self, id: &str, owner_hash: &str) -> Result<()> {
        self.ensure_open("add_owner")?;
        self.append_owner(id, owner_hash).await
    }

    async fn insert_or_add_owner(&self, record: LinkRecord) -> Result<InsertOutcome> {
        self.ensure_open("insert_or_add_owner")?;
        self.merge_or_insert(&record).await
    }

    async fn list_by_owner(&self, owner_hash: &str) -> Result<Vec<LinkRecord>> {
        self.ensure_open("list_by_owner")?;
        let owned = self.load_owned(owner_hash).await?;
        if owned.is_empty() {
            return Err(LinkvaultError::empty_result(
                "the owner has no previously created links",
            ));
        }
        Ok(owned)
    }

    async fn delete_batch(&self, ids: &HashSet<String>) -> Result<()> {
        self.ensure_open("delete_batch")?;
        if ids.is_empty() {
            return Ok(());
        }
        self.tombstone(ids).await
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_open("ping")?;
        self.db
            .ping()
            .await
            .map_err(|e| LinkvaultError::backend("ping", e))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.db
            .clone()
            .close()
            .await
            .map_err(|e| LinkvaultError::backend("close", e))
    }
}
