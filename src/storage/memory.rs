//! In-memory backend: one id → record map behind a reader/writer lock,
//! with a base_url index over live records. Nothing survives a restart.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{InsertOutcome, LinkRecord, LinkStore, StorageInfo};
use crate::errors::{LinkvaultError, Result};

#[derive(Default)]
struct Links {
    by_id: HashMap<String, LinkRecord>,
    /// base_url → id, live records only.
    live_urls: HashMap<String, String>,
}

impl Links {
    fn find_live(&self, base_url: &str) -> Option<&LinkRecord> {
        self.live_urls.get(base_url).and_then(|id| self.by_id.get(id))
    }

    fn insert(&mut self, record: LinkRecord) {
        if record.is_live() {
            self.live_urls
                .insert(record.base_url.clone(), record.id.clone());
        }
        self.by_id.insert(record.id.clone(), record);
    }

    fn tombstone(&mut self, id: &str) {
        let Some(link) = self.by_id.get_mut(id).filter(|link| link.is_live()) else {
            return;
        };
        link.deleted = true;
        if self.live_urls.get(&link.base_url).is_some_and(|owner| owner == id) {
            self.live_urls.remove(&link.base_url);
        }
    }

    /// Insert checks shared by `put` and `put_batch`; `pending` holds records
    /// accepted earlier in the same batch.
    fn check_insert(&self, pending: &[&LinkRecord], record: &LinkRecord) -> Result<()> {
        if self.by_id.contains_key(&record.id) || pending.iter().any(|p| p.id == record.id) {
            return Err(LinkvaultError::conflict(format!(
                "link id '{}' already exists",
                record.id
            )));
        }
        let url_taken = self.live_urls.contains_key(&record.base_url)
            || pending
                .iter()
                .any(|p| p.is_live() && p.base_url == record.base_url);
        if record.is_live() && url_taken {
            return Err(LinkvaultError::conflict(format!(
                "base url '{}' is already shortened",
                record.base_url
            )));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    links: RwLock<Links>,
    closed: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records, tombstones included.
    pub fn len(&self) -> usize {
        self.links.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.read().by_id.is_empty()
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LinkvaultError::backend(operation, "storage is closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl LinkStore for MemoryStorage {
    fn info(&self) -> StorageInfo {
        StorageInfo {
            storage_type: "memory".into(),
            transactional_delete: true,
            persistent: false,
        }
    }

    async fn put(&self, record: LinkRecord) -> Result<()> {
        self.ensure_open("put")?;
        let mut links = self.links.write();
        links.check_insert(&[], &record)?;
        links.insert(record);
        Ok(())
    }

    async fn put_batch(&self, records: Vec<LinkRecord>) -> Result<()> {
        self.ensure_open("put_batch")?;
        let mut links = self.links.write();

        // 全部校验通过后再写入，保证整批要么全部成功要么全部失败
        let mut accepted: Vec<&LinkRecord> = Vec::with_capacity(records.len());
        for record in &records {
            links.check_insert(&accepted, record)?;
            accepted.push(record);
        }

        for record in records {
            links.insert(record);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<LinkRecord> {
        self.ensure_open("get")?;
        self.links
            .read()
            .by_id
            .get(id)
            .filter(|link| link.is_live())
            .cloned()
            .ok_or_else(|| LinkvaultError::not_found(format!("link '{}' not found", id)))
    }

    async fn find_by_base_url(&self, base_url: &str) -> Result<Option<LinkRecord>> {
        self.ensure_open("find_by_base_url")?;
        Ok(self.links.read().find_live(base_url).cloned())
    }

    async fn add_owner(&self, id: &str, owner_hash: &str) -> Result<()> {
        self.ensure_open("add_owner")?;
        let mut links = self.links.write();
        match links.by_id.get_mut(id).filter(|link| link.is_live()) {
            Some(link) => {
                link.add_owner(owner_hash);
                Ok(())
            }
            None => Err(LinkvaultError::not_found(format!("link '{}' not found", id))),
        }
    }

    async fn insert_or_add_owner(&self, record: LinkRecord) -> Result<InsertOutcome> {
        self.ensure_open("insert_or_add_owner")?;
        let mut links = self.links.write();

        if let Some(id) = links.live_urls.get(&record.base_url).cloned() {
            if let Some(link) = links.by_id.get_mut(&id) {
                for owner in &record.owners {
                    link.add_owner(owner);
                }
            }
            return Ok(InsertOutcome { id, existed: true });
        }

        links.check_insert(&[], &record)?;
        let id = record.id.clone();
        links.insert(record);
        Ok(InsertOutcome { id, existed: false })
    }

    async fn list_by_owner(&self, owner_hash: &str) -> Result<Vec<LinkRecord>> {
        self.ensure_open("list_by_owner")?;
        let mut owned: Vec<LinkRecord> = self
            .links
            .read()
            .by_id
            .values()
            .filter(|link| link.is_live() && link.is_owned_by(owner_hash))
            .cloned()
            .collect();

        if owned.is_empty() {
            return Err(LinkvaultError::empty_result(
                "the owner has no previously created links",
            ));
        }
        owned.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(owned)
    }

    async fn delete_batch(&self, ids: &HashSet<String>) -> Result<()> {
        self.ensure_open("delete_batch")?;
        let mut links = self.links.write();
        for id in ids {
            links.tombstone(id);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_open("ping")
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
