//! Append-only file backend
//!
//! Every mutation appends the full new version of the record as one JSON
//! line. Reads replay the log from the start and keep the last version of
//! each id, so an owner update or a tombstone is just another line. The log
//! is never compacted.
//!
//! `delete_batch` writes all tombstones with a single append; a crash halfway
//! through that write can leave a partial batch, which is weaker than the
//! relational backend's transaction.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{InsertOutcome, LinkRecord, LinkStore, StorageInfo};
use crate::errors::{LinkvaultError, Result};

pub struct FileStorage {
    path: PathBuf,
    /// Append handle; `None` once closed. Held for the whole of every
    /// operation so read-modify-write sequences are serialized.
    handle: Mutex<Option<File>>,
}

impl FileStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| LinkvaultError::backend("open", format!("{}: {}", path.display(), e)))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LinkvaultError::backend("open", format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            path,
            handle: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Latest version of every record in the log, tombstones included.
    fn replay(&self, operation: &str) -> Result<HashMap<String, LinkRecord>> {
        let file = File::open(&self.path).map_err(|e| LinkvaultError::backend(operation, e))?;
        let mut links = HashMap::new();

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| LinkvaultError::backend(operation, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: LinkRecord = serde_json::from_str(&line).map_err(|e| {
                LinkvaultError::backend(operation, format!("corrupt line {}: {}", index + 1, e))
            })?;
            links.insert(record.id.clone(), record);
        }

        Ok(links)
    }

    fn append(file: &mut File, operation: &str, records: &[&LinkRecord]) -> Result<()> {
        let mut buf = String::new();
        for record in records {
            let line =
                serde_json::to_string(record).map_err(|e| LinkvaultError::backend(operation, e))?;
            buf.push_str(&line);
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| LinkvaultError::backend(operation, e))
    }

    fn with_handle<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut File) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.handle.lock();
        match guard.as_mut() {
            Some(file) => f(file),
            None => Err(LinkvaultError::backend(operation, "storage is closed")),
        }
    }

    fn check_insert(
        links: &HashMap<String, LinkRecord>,
        pending: &[&LinkRecord],
        record: &LinkRecord,
    ) -> Result<()> {
        if links.contains_key(&record.id) || pending.iter().any(|p| p.id == record.id) {
            return Err(LinkvaultError::conflict(format!(
                "link id '{}' already exists",
                record.id
            )));
        }
        let url_taken = live_by_base_url(links, &record.base_url).is_some()
            || pending.iter().any(|p| p.base_url == record.base_url);
        if url_taken {
            return Err(LinkvaultError::conflict(format!(
                "base url '{}' is already shortened",
                record.base_url
            )));
        }
        Ok(())
    }
}

fn live_by_base_url<'a>(
    links: &'a HashMap<String, LinkRecord>,
    base_url: &str,
) -> Option<&'a LinkRecord> {
    links
        .values()
        .find(|link| link.is_live() && link.base_url == base_url)
}

#[async_trait]
impl LinkStore for FileStorage {
    fn info(&self) -> StorageInfo {
        StorageInfo {
            storage_type: "file".into(),
            transactional_delete: false,
            persistent: true,
        }
    }

    async fn put(&self, record: LinkRecord) -> Result<()> {
        self.with_handle("put", |file| {
            let links = self.replay("put")?;
            Self::check_insert(&links, &[], &record)?;
            Self::append(file, "put", &[&record])
        })
    }

    async fn put_batch(&self, records: Vec<LinkRecord>) -> Result<()> {
        self.with_handle("put_batch", |file| {
            let links = self.replay("put_batch")?;
            let mut accepted: Vec<&LinkRecord> = Vec::with_capacity(records.len());
            for record in &records {
                Self::check_insert(&links, &accepted, record)?;
                accepted.push(record);
            }
            Self::append(file, "put_batch", &accepted)
        })
    }

    async fn get(&self, id: &str) -> Result<LinkRecord> {
        self.with_handle("get", |_| {
            self.replay("get")?
                .remove(id)
                .filter(|link| link.is_live())
                .ok_or_else(|| LinkvaultError::not_found(format!("link '{}' not found", id)))
        })
    }

    async fn find_by_base_url(&self, base_url: &str) -> Result<Option<LinkRecord>> {
        self.with_handle("find_by_base_url", |_| {
            let links = self.replay("find_by_base_url")?;
            Ok(live_by_base_url(&links, base_url).cloned())
        })
    }

    async fn add_owner(&self, id: &str, owner_hash: &str) -> Result<()> {
        self.with_handle("add_owner", |file| {
            let mut link = self
                .replay("add_owner")?
                .remove(id)
                .filter(|link| link.is_live())
                .ok_or_else(|| LinkvaultError::not_found(format!("link '{}' not found", id)))?;

            if link.add_owner(owner_hash) {
                Self::append(file, "add_owner", &[&link])?;
            }
            Ok(())
        })
    }

    async fn insert_or_add_owner(&self, record: LinkRecord) -> Result<InsertOutcome> {
        self.with_handle("insert_or_add_owner", |file| {
            let links = self.replay("insert_or_add_owner")?;

            if let Some(existing) = live_by_base_url(&links, &record.base_url) {
                let mut merged = existing.clone();
                let mut changed = false;
                for owner in &record.owners {
                    changed |= merged.add_owner(owner);
                }
                if changed {
                    Self::append(file, "insert_or_add_owner", &[&merged])?;
                }
                return Ok(InsertOutcome {
                    id: merged.id,
                    existed: true,
                });
            }

            Self::check_insert(&links, &[], &record)?;
            Self::append(file, "insert_or_add_owner", &[&record])?;
            Ok(InsertOutcome {
                id: record.id,
                existed: false,
            })
        })
    }

    async fn list_by_owner(&self, owner_hash: &str) -> Result<Vec<LinkRecord>> {
        self.with_handle("list_by_owner", |_| {
            let mut owned: Vec<LinkRecord> = self
                .replay("list_by_owner")?
                .into_values()
                .filter(|link| link.is_live() && link.is_owned_by(owner_hash))
                .collect();

            if owned.is_empty() {
                return Err(LinkvaultError::empty_result(
                    "the owner has no previously created links",
                ));
            }
            owned.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(owned)
        })
    }

    async fn delete_batch(&self, ids: &HashSet<String>) -> Result<()> {
        self.with_handle("delete_batch", |file| {
            let links = self.replay("delete_batch")?;
            let tombstones: Vec<LinkRecord> = ids
                .iter()
                .filter_map(|id| links.get(id))
                .filter(|link| link.is_live())
                .map(|link| LinkRecord {
                    deleted: true,
                    ..link.clone()
                })
                .collect();

            if tombstones.is_empty() {
                return Ok(());
            }
            let refs: Vec<&LinkRecord> = tombstones.iter().collect();
            Self::append(file, "delete_batch", &refs)
        })
    }

    async fn ping(&self) -> Result<()> {
        self.with_handle("ping", |_| {
            std::fs::metadata(&self.path)
                .map(|_| ())
                .map_err(|e| LinkvaultError::backend("ping", e))
        })
    }

    async fn close(&self) -> Result<()> {
        if let Some(mut file) = self.handle.lock().take() {
            file.flush().map_err(|e| LinkvaultError::backend("close", e))?;
        }
        Ok(())
    }
}
