use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One short link, shared by every owner that submitted its `base_url`.
///
/// This is also the on-disk line format of the append-only file backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: String,
    pub base_url: String,
    #[serde(default)]
    pub owners: BTreeSet<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl LinkRecord {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            owners: BTreeSet::from([owner.into()]),
            deleted: false,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.deleted
    }

    pub fn is_owned_by(&self, owner_hash: &str) -> bool {
        self.owners.contains(owner_hash)
    }

    /// Returns `true` when the owner was not present before.
    pub fn add_owner(&mut self, owner_hash: &str) -> bool {
        if self.owners.contains(owner_hash) {
            return false;
        }
        self.owners.insert(owner_hash.to_string())
    }
}

/// Result of the atomic dedup write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Id of the live record now holding the base URL.
    pub id: String,
    /// `true` when an existing live record absorbed the owner.
    pub existed: bool,
}

/// Static description of a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageInfo {
    pub storage_type: String,
    /// `true` when `delete_batch` is all-or-nothing.
    pub transactional_delete: bool,
    pub persistent: bool,
}
