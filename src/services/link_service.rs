//! Link registry service
//!
//! Business rules on top of a [`LinkStore`]: dedup on add, owner-scoped
//! listing, and ownership-checked deletion through the deletion batcher.
//! Shared by the CLI and any other boundary layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::deletion::DeletionQueue;
use crate::errors::{LinkvaultError, Result};
use crate::storage::{LinkRecord, LinkStore};
use crate::utils::{CodeGenerator, RandomCodeGenerator};

// ============ DTOs ============

/// Result of [`LinkService::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddLinkResult {
    pub id: String,
    /// `true` when the URL was already shortened; boundary layers answer
    /// "conflict" instead of "created".
    pub was_existing: bool,
}

/// One entry of a batch import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub correlation_id: String,
    pub base_url: String,
    pub owner_hash: String,
}

/// Id assigned to a batch entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAssignment {
    pub correlation_id: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedLink {
    pub id: String,
    pub base_url: String,
}

// ============ Service ============

#[derive(Clone)]
pub struct LinkService {
    store: Arc<dyn LinkStore>,
    deletions: DeletionQueue,
    generator: Arc<dyn CodeGenerator>,
    id_length: usize,
}

impl LinkService {
    pub fn new(store: Arc<dyn LinkStore>, deletions: DeletionQueue, id_length: usize) -> Self {
        Self {
            store,
            deletions,
            generator: Arc::new(RandomCodeGenerator),
            id_length,
        }
    }

    /// Replace the id generator (deterministic ids in tests).
    pub fn with_generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn store(&self) -> &Arc<dyn LinkStore> {
        &self.store
    }

    fn next_id(&self) -> String {
        self.generator.generate(self.id_length)
    }

    /// Shorten `base_url` for `owner_hash`, reusing the live link for the
    /// same URL when there is one.
    pub async fn add(&self, base_url: &str, owner_hash: &str) -> Result<AddLinkResult> {
        if base_url.is_empty() {
            return Err(LinkvaultError::validation("base url must not be empty"));
        }
        if owner_hash.is_empty() {
            return Err(LinkvaultError::validation("owner hash must not be empty"));
        }

        let record = LinkRecord::new(self.next_id(), base_url, owner_hash);
        match self.store.insert_or_add_owner(record).await {
            Ok(outcome) => {
                if outcome.existed {
                    debug!("URL already shortened as {}, owner added", outcome.id);
                } else {
                    info!("Created link {}", outcome.id);
                }
                Ok(AddLinkResult {
                    id: outcome.id,
                    was_existing: outcome.existed,
                })
            }
            // 并发插入同一 URL 时输掉竞争的一方，走已存在记录的路径
            Err(LinkvaultError::Conflict(msg)) => {
                let Some(existing) = self.store.find_by_base_url(base_url).await? else {
                    warn!("Insert conflict without a live record for the URL: {}", msg);
                    return Err(LinkvaultError::Conflict(msg));
                };
                self.store.add_owner(&existing.id, owner_hash).await?;
                debug!("Lost insert race, folded owner into {}", existing.id);
                Ok(AddLinkResult {
                    id: existing.id,
                    was_existing: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Insert fresh links for every entry in one backend call. No dedup.
    pub async fn add_batch(&self, entries: Vec<BatchEntry>) -> Result<Vec<BatchAssignment>> {
        if entries.is_empty() {
            return Err(LinkvaultError::validation("batch must not be empty"));
        }
        if let Some(bad) = entries
            .iter()
            .find(|e| e.base_url.is_empty() || e.owner_hash.is_empty())
        {
            return Err(LinkvaultError::validation(format!(
                "entry '{}' has an empty url or owner",
                bad.correlation_id
            )));
        }

        let mut records = Vec::with_capacity(entries.len());
        let mut assignments = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = self.next_id();
            records.push(LinkRecord::new(id.clone(), entry.base_url, entry.owner_hash));
            assignments.push(BatchAssignment {
                correlation_id: entry.correlation_id,
                id,
            });
        }

        self.store.put_batch(records).await?;
        info!("Imported {} links", assignments.len());
        Ok(assignments)
    }

    pub async fn get(&self, id: &str) -> Result<String> {
        Ok(self.store.get(id).await?.base_url)
    }

    /// Every live link of `owner_hash`; `EmptyResult` when there are none.
    pub async fn get_all(&self, owner_hash: &str) -> Result<Vec<OwnedLink>> {
        let links = self.store.list_by_owner(owner_hash).await?;
        Ok(links
            .into_iter()
            .map(|link| OwnedLink {
                id: link.id,
                base_url: link.base_url,
            })
            .collect())
    }

    /// Queue the ids `owner_hash` owns for deletion and return how many were
    /// queued. Unknown ids and ids owned by someone else are skipped.
    pub async fn delete_batch(&self, ids: &[String], owner_hash: &str) -> Result<usize> {
        if owner_hash.is_empty() {
            return Err(LinkvaultError::validation("owner hash must not be empty"));
        }

        let mut queued = 0;
        for id in ids {
            let link = match self.store.get(id).await {
                Ok(link) => link,
                Err(LinkvaultError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            if !link.is_owned_by(owner_hash) {
                debug!("Skipping delete of {}: not owned by caller", id);
                continue;
            }
            self.deletions.push(link.id)?;
            queued += 1;
        }

        debug!("Queued {} of {} ids for deletion", queued, ids.len());
        Ok(queued)
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}
