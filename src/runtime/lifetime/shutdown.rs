use std::time::Duration;

use tokio::time::timeout;
use tracing::{error, info, warn};

use super::startup::StartupContext;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 单个任务超时时间（秒）
const TASK_TIMEOUT_SECS: u64 = 10;

/// Drain pending deletions, then close the store. Bounded by
/// `SHUTDOWN_TIMEOUT_SECS` overall.
pub async fn shutdown(ctx: StartupContext) {
    let result = timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        perform_shutdown_tasks(ctx),
    )
    .await;

    match result {
        Ok(()) => info!("All shutdown tasks completed successfully"),
        Err(_) => error!(
            "Shutdown tasks timed out after {} seconds",
            SHUTDOWN_TIMEOUT_SECS
        ),
    }
}

async fn perform_shutdown_tasks(ctx: StartupContext) {
    let StartupContext {
        store,
        link_service,
        deletion_worker,
    } = ctx;
    // 服务持有队列的发送端，先释放
    drop(link_service);

    if deletion_worker
        .shutdown_with_timeout(Duration::from_secs(TASK_TIMEOUT_SECS))
        .await
    {
        info!("Deletion batcher drained");
    }

    match timeout(Duration::from_secs(TASK_TIMEOUT_SECS), store.close()).await {
        Ok(Ok(())) => info!("Storage backend closed"),
        Ok(Err(e)) => warn!("Failed to close storage backend: {}", e),
        Err(_) => error!(
            "Closing storage backend timed out after {} seconds",
            TASK_TIMEOUT_SECS
        ),
    }
}
