//! Deletion batcher task
//!
//! Flushes under two triggers: the buffer reaching `batch_size`, or the
//! periodic tick finding a non-empty buffer. On shutdown the intake is
//! closed, whatever is still queued is drained and flushed in chunks of at
//! most `batch_size`, and the task ends in [`BatcherState::Stopped`].

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, trace, warn};

use super::DeletionSink;
use crate::config::DeletionConfig;
use crate::errors::{LinkvaultError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatcherConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            flush_interval: Duration::from_secs(3),
        }
    }
}

impl From<&DeletionConfig> for BatcherConfig {
    fn from(config: &DeletionConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatcherState {
    /// Buffer empty.
    Idle,
    /// Buffer holds fewer ids than the batch size.
    Accumulating,
    /// A batch is being handed to the sink.
    Flushing,
    /// Intake closed; no more ids are accepted.
    Stopped,
}

impl BatcherState {
    fn as_u8(self) -> u8 {
        match self {
            BatcherState::Idle => 0,
            BatcherState::Accumulating => 1,
            BatcherState::Flushing => 2,
            BatcherState::Stopped => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => BatcherState::Idle,
            1 => BatcherState::Accumulating,
            2 => BatcherState::Flushing,
            _ => BatcherState::Stopped,
        }
    }
}

#[derive(Debug)]
struct SharedState(AtomicU8);

impl SharedState {
    fn get(&self) -> BatcherState {
        BatcherState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: BatcherState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

/// Producer side of the batcher. Cheap to clone; every clone feeds the same
/// task.
#[derive(Debug, Clone)]
pub struct DeletionQueue {
    tx: mpsc::UnboundedSender<String>,
    state: Arc<SharedState>,
}

impl DeletionQueue {
    /// Queue one id. Fails once the batcher has stopped.
    pub fn push(&self, id: impl Into<String>) -> Result<()> {
        self.tx
            .send(id.into())
            .map_err(|_| LinkvaultError::backend("enqueue_delete", "deletion queue is closed"))
    }

    pub fn state(&self) -> BatcherState {
        self.state.get()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Handle owning the background task.
pub struct DeletionWorker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
    state: Arc<SharedState>,
}

impl DeletionWorker {
    pub fn state(&self) -> BatcherState {
        self.state.get()
    }

    /// Stop the batcher and wait for the final drain to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!("Deletion batcher task ended abnormally: {}", e);
        }
    }

    /// Like [`shutdown`](Self::shutdown) but gives up waiting after `limit`.
    /// Returns `false` on timeout; the drain keeps running detached.
    pub async fn shutdown_with_timeout(self, limit: Duration) -> bool {
        let _ = self.shutdown.send(true);
        match tokio::time::timeout(limit, self.handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Deletion batcher task ended abnormally: {}", e);
                true
            }
            Err(_) => {
                warn!(
                    "Deletion batcher did not finish draining within {:?}",
                    limit
                );
                false
            }
        }
    }
}

/// Start the batcher on the current tokio runtime.
pub fn spawn_deletion_batcher(
    sink: Arc<dyn DeletionSink>,
    config: BatcherConfig,
) -> (DeletionQueue, DeletionWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = Arc::new(SharedState(AtomicU8::new(BatcherState::Idle.as_u8())));

    let batcher = Batcher {
        rx,
        shutdown: shutdown_rx,
        sink,
        config,
        state: Arc::clone(&state),
    };
    let handle = tokio::spawn(batcher.run());

    info!(
        "Deletion batcher started (batch_size={}, interval={:?})",
        config.batch_size, config.flush_interval
    );

    (
        DeletionQueue {
            tx,
            state: Arc::clone(&state),
        },
        DeletionWorker {
            shutdown: shutdown_tx,
            handle,
            state,
        },
    )
}

struct Batcher {
    rx: mpsc::UnboundedReceiver<String>,
    shutdown: watch::Receiver<bool>,
    sink: Arc<dyn DeletionSink>,
    config: BatcherConfig,
    state: Arc<SharedState>,
}

impl Batcher {
    async fn run(mut self) {
        let period = self.config.flush_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut buffer: Vec<String> = Vec::with_capacity(self.config.batch_size);

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                received = self.rx.recv() => match received {
                    Some(id) => {
                        buffer.push(id);
                        if buffer.len() >= self.config.batch_size {
                            self.flush(&mut buffer, "size").await;
                        } else {
                            self.state.set(BatcherState::Accumulating);
                        }
                    }
                    // 所有 DeletionQueue 都已被丢弃
                    None => break,
                },
                _ = ticker.tick() => {
                    if !buffer.is_empty() {
                        self.flush(&mut buffer, "interval").await;
                    }
                }
            }
        }

        self.rx.close();
        self.state.set(BatcherState::Stopped);

        // 关闭时的最终排空，仍按 batch_size 分批提交
        let mut drained = buffer.len();
        while let Ok(id) = self.rx.try_recv() {
            buffer.push(id);
            drained += 1;
            if buffer.len() >= self.config.batch_size {
                self.deliver(std::mem::take(&mut buffer), "shutdown").await;
            }
        }
        if !buffer.is_empty() {
            self.deliver(std::mem::take(&mut buffer), "shutdown").await;
        }
        if drained > 0 {
            debug!("Deletion batcher drained {} ids on shutdown", drained);
        }

        info!("Deletion batcher stopped");
    }

    async fn flush(&self, buffer: &mut Vec<String>, trigger: &str) {
        self.state.set(BatcherState::Flushing);
        let pending = std::mem::replace(buffer, Vec::with_capacity(self.config.batch_size));
        self.deliver(pending, trigger).await;
        self.state.set(BatcherState::Idle);
    }

    async fn deliver(&self, pending: Vec<String>, trigger: &str) {
        let ids: HashSet<String> = pending.into_iter().collect();
        trace!("Deletion batch ({}) holds {} unique ids", trigger, ids.len());

        match self.sink.delete_batch(&ids).await {
            Ok(()) => debug!("Deleted batch of {} links ({} trigger)", ids.len(), trigger),
            Err(e) => warn!(
                "Deletion batch of {} links failed and was dropped ({} trigger): {}",
                ids.len(),
                trigger,
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::time::timeout;

    /// Forwards each batch to a channel the test can await on.
    struct ChannelSink {
        tx: mpsc::UnboundedSender<HashSet<String>>,
        fail_first: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl DeletionSink for ChannelSink {
        async fn delete_batch(&self, ids: &HashSet<String>) -> Result<()> {
            let _ = self.tx.send(ids.clone());
            if self.fail_first.swap(false, Ordering::SeqCst) {
                return Err(LinkvaultError::backend("delete_batch", "disk full"));
            }
            Ok(())
        }
    }

    fn start(
        fail_first: bool,
    ) -> (
        DeletionQueue,
        DeletionWorker,
        mpsc::UnboundedReceiver<HashSet<String>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(ChannelSink {
            tx,
            fail_first: std::sync::atomic::AtomicBool::new(fail_first),
        });
        let (queue, worker) = spawn_deletion_batcher(sink, BatcherConfig::default());
        (queue, worker, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_trigger_fires_before_tick() {
        let (queue, worker, mut batches) = start(false);

        for i in 0..10 {
            queue.push(format!("id{}", i)).unwrap();
        }

        let batch = timeout(Duration::from_secs(1), batches.recv())
            .await
            .expect("size trigger should flush before the first tick")
            .unwrap();
        assert_eq!(batch.len(), 10);

        worker.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_flushes_partial_batch() {
        let (queue, worker, mut batches) = start(false);

        for i in 0..3 {
            queue.push(format!("id{}", i)).unwrap();
        }

        assert!(
            timeout(Duration::from_secs(1), batches.recv())
                .await
                .is_err()
        );
        assert_eq!(queue.state(), BatcherState::Accumulating);

        let batch = timeout(Duration::from_secs(5), batches.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.len(), 3);

        worker.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_ids_collapse_within_a_batch() {
        let (queue, worker, mut batches) = start(false);

        for _ in 0..10 {
            queue.push("same").unwrap();
        }

        let batch = timeout(Duration::from_secs(1), batches.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch, HashSet::from(["same".to_string()]));

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_pending_ids() {
        let (queue, worker, mut batches) = start(false);

        queue.push("a").unwrap();
        queue.push("b").unwrap();
        worker.shutdown().await;

        let batch = batches.recv().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(queue.state(), BatcherState::Stopped);
        assert!(queue.push("c").is_err());
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_shutdown_drain_respects_batch_size() {
        let (queue, worker, mut batches) = start(false);

        for i in 0..25 {
            queue.push(format!("id{}", i)).unwrap();
        }
        worker.shutdown().await;

        let mut sizes = Vec::new();
        let mut seen = HashSet::new();
        while let Ok(batch) = batches.try_recv() {
            sizes.push(batch.len());
            seen.extend(batch);
        }
        assert!(sizes.iter().all(|&n| n <= 10), "batch sizes: {:?}", sizes);
        assert_eq!(sizes.len(), 3);
        assert_eq!(seen.len(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_is_dropped() {
        let (queue, worker, mut batches) = start(true);

        for i in 0..10 {
            queue.push(format!("id{}", i)).unwrap();
        }
        let failed = batches.recv().await.unwrap();
        assert_eq!(failed.len(), 10);

        queue.push("later").unwrap();
        worker.shutdown().await;

        // 失败的批次不会重试，只剩下新的 id
        let next = batches.recv().await.unwrap();
        assert_eq!(next, HashSet::from(["later".to_string()]));
        assert!(batches.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropping_every_queue_stops_the_task() {
        let (queue, worker, _batches) = start(false);
        drop(queue);

        assert!(worker.shutdown_with_timeout(Duration::from_secs(5)).await);
    }
}
