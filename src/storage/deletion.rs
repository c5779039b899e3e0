//! 删除请求去抖
//!
//! 调用方只负责把 [`DeletionRequest`] 放进无界队列；唯一的后台 worker 按用户合并
//! key 列表，在累计数量超过阈值或定时器触发时批量写入 [`DeletionSink`]。
//! 刷盘失败只记录日志，不重试，也不会反馈给已经拿到“已接受”的调用方。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use super::models::DeletionRequest;
use crate::errors::{Result, ShortenerError};

/// 删除批量写入的目标
#[async_trait::async_trait]
pub trait DeletionSink: Send + Sync {
    /// 将该用户名下的 key 标记为删除；不属于该用户的 key 必须被忽略
    async fn apply_deletions(&self, owner_user_id: u64, keys: &[u64]) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct DebounceConfig {
    /// 累计 key 数超过该值立即刷盘
    pub batch_threshold: usize,
    pub flush_interval: Duration,
    /// 单个用户一次写入的超时
    pub flush_timeout: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            batch_threshold: 1000,
            flush_interval: Duration::from_secs(10),
            flush_timeout: Duration::from_millis(1000),
        }
    }
}

/// `tokio::time::interval` 不接受零周期
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// 按用户合并的待删除 key
#[derive(Default)]
struct PendingDeletions {
    /// 保留用户第一次出现的顺序
    order: Vec<u64>,
    by_owner: HashMap<u64, Vec<u64>>,
    total: usize,
}

impl PendingDeletions {
    fn push(&mut self, request: DeletionRequest) {
        if request.keys.is_empty() {
            return;
        }
        let owner = request.owner_user_id;
        self.total += request.keys.len();
        self.by_owner
            .entry(owner)
            .or_insert_with(|| {
                self.order.push(owner);
                Vec::new()
            })
            .extend(request.keys);
    }

    fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn take(&mut self) -> Vec<(u64, Vec<u64>)> {
        let mut by_owner = std::mem::take(&mut self.by_owner);
        self.total = 0;
        std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|owner| by_owner.remove(&owner).map(|keys| (owner, keys)))
            .collect()
    }
}

/// 后台删除 worker 的句柄
///
/// 每个数据库后端实例拥有一个；`shutdown` 关闭队列并等待最后一次刷盘完成。
pub struct DeletionDebouncer {
    sender: Mutex<Option<mpsc::UnboundedSender<DeletionRequest>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DeletionDebouncer {
    /// 启动 worker，必须在 tokio 运行时内调用
    pub fn spawn(sink: Arc<dyn DeletionSink>, mut config: DebounceConfig) -> Self {
        if config.flush_interval < MIN_FLUSH_INTERVAL {
            warn!(
                "DeletionDebouncer: flush interval {:?} too small, using {:?}",
                config.flush_interval, MIN_FLUSH_INTERVAL
            );
            config.flush_interval = MIN_FLUSH_INTERVAL;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(rx, sink, config));

        Self {
            sender: Mutex::new(Some(tx)),
            worker: tokio::sync::Mutex::new(Some(handle)),
        }
    }

    /// 入队，不等待写入
    pub fn enqueue(&self, request: DeletionRequest) -> Result<()> {
        let guard = self.sender.lock();
        let sender = guard
            .as_ref()
            .ok_or_else(|| ShortenerError::internal("删除队列已关闭"))?;

        trace!(
            "DeletionDebouncer: enqueue {} keys for user {}",
            request.keys.len(),
            request.owner_user_id
        );
        sender
            .send(request)
            .map_err(|_| ShortenerError::internal("删除 worker 已退出"))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// 停止接收新请求，等待剩余请求刷盘后返回；重复调用无副作用
    pub async fn shutdown(&self) {
        // 先丢弃发送端，worker 读到 None 后执行最终刷盘
        drop(self.sender.lock().take());

        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("DeletionDebouncer: worker terminated abnormally: {}", e);
            } else {
                info!("DeletionDebouncer: worker stopped");
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<DeletionRequest>,
    sink: Arc<dyn DeletionSink>,
    config: DebounceConfig,
) {
    let mut pending = PendingDeletions::default();
    let mut ticker = tokio::time::interval(config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval 的第一次 tick 立即完成
    ticker.tick().await;

    debug!(
        "DeletionDebouncer: worker started (threshold={}, interval={:?})",
        config.batch_threshold, config.flush_interval
    );

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(request) => {
                    pending.push(request);
                    if pending.total > config.batch_threshold {
                        debug!(
                            "DeletionDebouncer: threshold reached ({} keys), flushing",
                            pending.total
                        );
                        flush(&mut pending, sink.as_ref(), config.flush_timeout).await;
                    }
                }
                None => {
                    flush(&mut pending, sink.as_ref(), config.flush_timeout).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                flush(&mut pending, sink.as_ref(), config.flush_timeout).await;
            }
        }
    }
}

async fn flush(pending: &mut PendingDeletions, sink: &dyn DeletionSink, timeout: Duration) {
    if pending.is_empty() {
        return;
    }

    let batches = pending.take();
    let owners = batches.len();
    let mut failed = 0usize;

    for (owner, keys) in batches {
        match tokio::time::timeout(timeout, sink.apply_deletions(owner, &keys)).await {
            Ok(Ok(())) => {
                trace!(
                    "DeletionDebouncer: applied {} deletions for user {}",
                    keys.len(),
                    owner
                );
            }
            Ok(Err(e)) => {
                failed += 1;
                error!(
                    "DeletionDebouncer: failed to apply {} deletions for user {}: {}",
                    keys.len(),
                    owner,
                    e
                );
            }
            Err(_) => {
                failed += 1;
                warn!(
                    "DeletionDebouncer: applying deletions for user {} timed out after {:?}",
                    owner, timeout
                );
            }
        }
    }

    debug!(
        "DeletionDebouncer: flushed {} owners ({} failed)",
        owners, failed
    );
}
