use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::StaticConfig;
use crate::deletion::{BatcherConfig, DeletionWorker, StoreDeletionSink, spawn_deletion_batcher};
use crate::services::LinkService;
use crate::storage::{LinkStore, StorageFactory};

pub struct StartupContext {
    pub store: Arc<dyn LinkStore>,
    pub link_service: Arc<LinkService>,
    pub deletion_worker: DeletionWorker,
}

/// Overlay command-line storage flags on the loaded configuration.
pub fn effective_config(
    base: &StaticConfig,
    database_url: Option<String>,
    file_storage: Option<String>,
) -> StaticConfig {
    let mut config = base.clone();
    if let Some(url) = database_url.filter(|u| !u.is_empty()) {
        config.storage.database_url = url;
    }
    if let Some(path) = file_storage.filter(|p| !p.is_empty()) {
        config.storage.file_path = path;
    }
    config
}

/// 构建存储、删除批处理器与链接服务
pub async fn prepare_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let store = StorageFactory::create(&config.storage)
        .await
        .context("Failed to create storage backend")?;
    let info = store.info();
    info!(
        "Using storage backend: {} (persistent: {}, transactional delete: {})",
        info.storage_type, info.persistent, info.transactional_delete
    );

    let sink = Arc::new(StoreDeletionSink::new(Arc::clone(&store)));
    let (queue, deletion_worker) =
        spawn_deletion_batcher(sink, BatcherConfig::from(&config.deletion));

    let link_service = Arc::new(LinkService::new(
        Arc::clone(&store),
        queue,
        config.links.id_length,
    ));

    debug!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );

    Ok(StartupContext {
        store,
        link_service,
        deletion_worker,
    })
}
