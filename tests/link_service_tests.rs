//! LinkService integration tests
//!
//! Exercise the service with a real store and a running deletion batcher.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use linkvault::config::StorageConfig;
use linkvault::deletion::{
    BatcherConfig, DeletionWorker, StoreDeletionSink, spawn_deletion_batcher,
};
use linkvault::errors::LinkvaultError;
use linkvault::services::{BatchEntry, LinkService, OwnedLink};
use linkvault::storage::{LinkStore, MemoryStorage, StorageFactory};
use tempfile::TempDir;

const FAST_FLUSH: BatcherConfig = BatcherConfig {
    batch_size: 10,
    flush_interval: Duration::from_millis(50),
};

fn build_service(store: Arc<dyn LinkStore>) -> (LinkService, DeletionWorker) {
    let sink = Arc::new(StoreDeletionSink::new(Arc::clone(&store)));
    let (queue, worker) = spawn_deletion_batcher(sink, FAST_FLUSH);
    (LinkService::new(store, queue, 10), worker)
}

fn memory_service() -> (LinkService, DeletionWorker) {
    build_service(Arc::new(MemoryStorage::new()))
}

async fn sqlite_service() -> (LinkService, DeletionWorker, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = StorageConfig {
        database_url: format!(
            "sqlite://{}?mode=rwc",
            temp_dir.path().join("service.db").display()
        ),
        ..StorageConfig::default()
    };
    let store = StorageFactory::create(&config).await.unwrap();
    let (service, worker) = build_service(store);
    (service, worker, temp_dir)
}

// =============================================================================
// Add / dedup
// =============================================================================

#[cfg(test)]
mod add_tests {
    use super::*;

    #[tokio::test]
    async fn test_repeated_add_shares_one_id() {
        let (service, _worker) = memory_service();

        let first = service.add("https://a.example", "h1").await.unwrap();
        let second = service.add("https://a.example", "h2").await.unwrap();

        assert!(!first.was_existing);
        assert!(second.was_existing);
        assert_eq!(first.id, second.id);
        assert_eq!(first.id.len(), 10);

        let owned = service.get_all("h2").await.unwrap();
        assert_eq!(
            owned,
            vec![OwnedLink {
                id: first.id.clone(),
                base_url: "https://a.example".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_same_owner_adding_twice_is_existing() {
        let (service, _worker) = memory_service();

        let first = service.add("https://a.example", "h1").await.unwrap();
        let again = service.add("https://a.example", "h1").await.unwrap();
        assert_eq!(first.id, again.id);
        assert!(again.was_existing);
        assert_eq!(service.get_all("h1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_adds_fold_into_one_record() {
        let (service, _worker) = memory_service();
        let service = Arc::new(service);

        let mut handles = Vec::new();
        for i in 0..20 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service
                    .add("https://race.example", &format!("owner{}", i))
                    .await
                    .unwrap()
            }));
        }

        let mut ids = HashSet::new();
        let mut created = 0;
        for handle in handles {
            let result = handle.await.unwrap();
            ids.insert(result.id);
            if !result.was_existing {
                created += 1;
            }
        }

        assert_eq!(ids.len(), 1);
        assert_eq!(created, 1);
        for i in 0..20 {
            assert_eq!(
                service.get_all(&format!("owner{}", i)).await.unwrap().len(),
                1
            );
        }
    }

    #[tokio::test]
    async fn test_dedup_on_sqlite() {
        let (service, worker, _dir) = sqlite_service().await;

        let first = service.add("https://a.example", "h1").await.unwrap();
        let second = service.add("https://a.example", "h2").await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.was_existing);
        assert_eq!(
            service.get(&first.id).await.unwrap(),
            "https://a.example"
        );

        worker.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_fold_on_sqlite() {
        let (service, worker, _dir) = sqlite_service().await;
        let service = Arc::new(service);

        for round in 0..10 {
            let url = format!("https://race{}.example", round);
            let mut handles = Vec::new();
            for i in 0..8 {
                let service = Arc::clone(&service);
                let url = url.clone();
                handles.push(tokio::spawn(async move {
                    service.add(&url, &format!("h{}", i)).await
                }));
            }

            let mut ids = HashSet::new();
            let mut created = 0;
            for handle in handles {
                let result = handle.await.unwrap().unwrap();
                ids.insert(result.id);
                if !result.was_existing {
                    created += 1;
                }
            }
            assert_eq!(ids.len(), 1, "round {} produced several ids", round);
            assert_eq!(created, 1);

            let id = ids.into_iter().next().unwrap();
            for i in 0..8 {
                let owned = service.get_all(&format!("h{}", i)).await.unwrap();
                assert!(owned.iter().any(|link| link.id == id));
            }
        }

        worker.shutdown().await;
    }
}

// =============================================================================
// Get / GetAll
// =============================================================================

#[cfg(test)]
mod read_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_returns_original_url() {
        let (service, _worker) = memory_service();
        let added = service.add("https://a.example/path?q=1", "h1").await.unwrap();
        assert_eq!(
            service.get(&added.id).await.unwrap(),
            "https://a.example/path?q=1"
        );
        assert!(matches!(
            service.get("unknown").await,
            Err(LinkvaultError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_all_empty_then_one() {
        let (service, _worker) = memory_service();

        assert!(matches!(
            service.get_all("h1").await,
            Err(LinkvaultError::EmptyResult(_))
        ));

        let added = service.add("https://a.example", "h1").await.unwrap();
        assert_eq!(
            service.get_all("h1").await.unwrap(),
            vec![OwnedLink {
                id: added.id,
                base_url: "https://a.example".into()
            }]
        );
    }
}

// =============================================================================
// AddBatch
// =============================================================================

#[cfg(test)]
mod batch_tests {
    use super::*;

    fn entry(correlation_id: &str, url: &str) -> BatchEntry {
        BatchEntry {
            correlation_id: correlation_id.into(),
            base_url: url.into(),
            owner_hash: "h1".into(),
        }
    }

    #[tokio::test]
    async fn test_add_batch_assigns_ids_per_entry() {
        let (service, _worker) = memory_service();

        let assigned = service
            .add_batch(vec![
                entry("c1", "https://a.example"),
                entry("c2", "https://b.example"),
            ])
            .await
            .unwrap();

        assert_eq!(assigned.len(), 2);
        assert_eq!(assigned[0].correlation_id, "c1");
        assert_eq!(assigned[1].correlation_id, "c2");
        assert_ne!(assigned[0].id, assigned[1].id);
        assert_eq!(
            service.get(&assigned[1].id).await.unwrap(),
            "https://b.example"
        );
    }

    #[tokio::test]
    async fn test_add_batch_rejects_empty_input() {
        let (service, _worker) = memory_service();
        assert!(matches!(
            service.add_batch(Vec::new()).await,
            Err(LinkvaultError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_add_batch_on_sqlite() {
        let (service, worker, _dir) = sqlite_service().await;

        let assigned = service
            .add_batch(vec![
                entry("c1", "https://a.example"),
                entry("c2", "https://b.example"),
            ])
            .await
            .unwrap();
        assert_eq!(service.get_all("h1").await.unwrap().len(), 2);
        assert_eq!(
            service.get(&assigned[0].id).await.unwrap(),
            "https://a.example"
        );

        worker.shutdown().await;
    }
}

// =============================================================================
// DeleteBatch
// =============================================================================

#[cfg(test)]
mod delete_tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_takes_effect_after_flush() {
        let (service, worker) = memory_service();
        let added = service.add("https://a.example", "h1").await.unwrap();

        let queued = service
            .delete_batch(&[added.id.clone()], "h1")
            .await
            .unwrap();
        assert_eq!(queued, 1);

        worker.shutdown().await;
        assert!(matches!(
            service.get(&added.id).await,
            Err(LinkvaultError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_is_flushed_by_timer() {
        let (service, _worker) = memory_service();
        let added = service.add("https://a.example", "h1").await.unwrap();

        service.delete_batch(&[added.id.clone()], "h1").await.unwrap();

        let mut deleted = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            if service.get(&added.id).await.is_err() {
                deleted = true;
                break;
            }
        }
        assert!(deleted, "timer flush did not delete the link");
    }

    #[tokio::test]
    async fn test_delete_by_non_owner_has_no_effect() {
        let (service, worker) = memory_service();
        let added = service.add("https://a.example", "h1").await.unwrap();

        let queued = service
            .delete_batch(&[added.id.clone()], "intruder")
            .await
            .unwrap();
        assert_eq!(queued, 0);

        worker.shutdown().await;
        assert_eq!(service.get(&added.id).await.unwrap(), "https://a.example");
    }

    #[tokio::test]
    async fn test_shared_link_can_be_deleted_by_any_owner() {
        let (service, worker) = memory_service();
        let added = service.add("https://a.example", "h1").await.unwrap();
        service.add("https://a.example", "h2").await.unwrap();

        service.delete_batch(&[added.id.clone()], "h2").await.unwrap();
        worker.shutdown().await;

        assert!(service.get(&added.id).await.is_err());
        assert!(matches!(
            service.get_all("h1").await,
            Err(LinkvaultError::EmptyResult(_))
        ));
    }

    #[tokio::test]
    async fn test_readd_after_delete_creates_new_id() {
        let (service, worker) = memory_service();
        let added = service.add("https://a.example", "h1").await.unwrap();
        service.delete_batch(&[added.id.clone()], "h1").await.unwrap();

        // 等待后台批处理器落盘
        let mut gone = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            if service.get(&added.id).await.is_err() {
                gone = true;
                break;
            }
        }
        assert!(gone);

        let again = service.add("https://a.example", "h1").await.unwrap();
        assert!(!again.was_existing);
        assert_ne!(again.id, added.id);

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_on_sqlite_is_transactional() {
        let (service, worker, _dir) = sqlite_service().await;
        let mut ids = Vec::new();
        for i in 0..12 {
            ids.push(
                service
                    .add(&format!("https://{}.example", i), "h1")
                    .await
                    .unwrap()
                    .id,
            );
        }

        assert_eq!(service.delete_batch(&ids, "h1").await.unwrap(), 12);
        worker.shutdown().await;

        for id in &ids {
            assert!(service.get(id).await.is_err());
        }
    }

    #[tokio::test]
    async fn test_delete_after_shutdown_fails() {
        let (service, worker) = memory_service();
        let added = service.add("https://a.example", "h1").await.unwrap();
        worker.shutdown().await;

        assert!(matches!(
            service.delete_batch(&[added.id], "h1").await,
            Err(LinkvaultError::Backend { .. })
        ));
    }
}

#[cfg(test)]
mod ping_tests {
    use super::*;

    #[tokio::test]
    async fn test_ping_follows_store_lifecycle() {
        let (service, worker) = memory_service();
        service.ping().await.unwrap();

        worker.shutdown().await;
        service.store().close().await.unwrap();
        assert!(service.ping().await.is_err());
    }
}
