//! 异步批量删除
//!
//! Delete requests are pushed one id at a time into a [`DeletionQueue`]; a
//! single background task groups them and hands each group to a
//! [`DeletionSink`]. Deletion is at-most-once: a failed batch is logged and
//! dropped.

mod batcher;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::Result;
use crate::storage::LinkStore;

pub use batcher::{
    BatcherConfig, BatcherState, DeletionQueue, DeletionWorker, spawn_deletion_batcher,
};

/// Destination of flushed deletion batches.
#[async_trait]
pub trait DeletionSink: Send + Sync {
    async fn delete_batch(&self, ids: &HashSet<String>) -> Result<()>;
}

/// Tombstones each batch in a [`LinkStore`].
pub struct StoreDeletionSink {
    store: Arc<dyn LinkStore>,
}

impl StoreDeletionSink {
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DeletionSink for StoreDeletionSink {
    async fn delete_batch(&self, ids: &HashSet<String>) -> Result<()> {
        self.store.delete_batch(ids).await
    }
}
