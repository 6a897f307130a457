//! Link storage
//!
//! Every backend implements [`LinkStore`]; the process picks one at startup
//! through [`StorageFactory`] and shares it as `Arc<dyn LinkStore>`.
//! Backends report failures as typed errors rather than logging them.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{StorageConfig, StorageSelection};
use crate::errors::Result;

pub mod backend;
pub mod file;
pub mod memory;
pub mod models;

pub use backend::SeaOrmStorage;
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use models::{InsertOutcome, LinkRecord, StorageInfo};

#[async_trait]
pub trait LinkStore: Send + Sync {
    fn info(&self) -> StorageInfo;

    /// Insert a new record; `Conflict` when the id (or a live base URL) is taken.
    async fn put(&self, record: LinkRecord) -> Result<()>;

    /// Insert several fresh records as one unit.
    async fn put_batch(&self, records: Vec<LinkRecord>) -> Result<()>;

    /// Live record by id; `NotFound` when absent or tombstoned.
    async fn get(&self, id: &str) -> Result<LinkRecord>;

    /// Live record holding `base_url`, if any.
    async fn find_by_base_url(&self, base_url: &str) -> Result<Option<LinkRecord>>;

    /// Add `owner_hash` to a live record. Adding a present owner is a no-op.
    async fn add_owner(&self, id: &str, owner_hash: &str) -> Result<()>;

    /// Atomic dedup write: fold the record's owners into the live record for
    /// the same base URL, or insert it when there is none.
    async fn insert_or_add_owner(&self, record: LinkRecord) -> Result<InsertOutcome>;

    /// Live records owned by `owner_hash`; `EmptyResult` when there are none.
    async fn list_by_owner(&self, owner_hash: &str) -> Result<Vec<LinkRecord>>;

    /// Tombstone every given id. Unknown or already deleted ids are skipped.
    async fn delete_batch(&self, ids: &HashSet<String>) -> Result<()>;

    async fn ping(&self) -> Result<()>;

    /// Release file handles or pools. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}

pub struct StorageFactory;

impl StorageFactory {
    pub async fn create(config: &StorageConfig) -> Result<Arc<dyn LinkStore>> {
        let store: Arc<dyn LinkStore> = match config.selection() {
            StorageSelection::Database(url) => {
                let backend_type = backend::infer_backend_from_url(&url)?;
                Arc::new(SeaOrmStorage::new(&url, &backend_type, config).await?)
            }
            StorageSelection::File(path) => Arc::new(FileStorage::open(path)?),
            StorageSelection::Memory => Arc::new(MemoryStorage::new()),
        };
        Ok(store)
    }
}
