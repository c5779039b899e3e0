//! 有界并发的短 ID 批量解码
//!
//! 输入被切成至多 `max_workers` 段连续的块，每块在独立任务中顺序解码；
//! 任意一块失败即整体失败，结果顺序与输入一致。

use futures_util::future::try_join_all;
use tracing::trace;

use crate::errors::{Result, ShortenerError};
use crate::storage::decode_key;

/// 单个请求允许的最大并发 worker 数
pub const MAX_WORKERS_PER_REQUEST: usize = 5;
/// 不限制 worker 数：退化为顺序解码
pub const UNLIMITED_WORKERS: usize = 0;

fn decode_sequential(ids: &[String]) -> Result<Vec<u64>> {
    ids.iter().map(|id| decode_key(id)).collect()
}

pub async fn decode_keys(ids: Vec<String>, max_workers: usize) -> Result<Vec<u64>> {
    if max_workers <= 1 || ids.len() <= 1 {
        return decode_sequential(&ids);
    }

    let chunk_size = ids.len().div_ceil(max_workers);
    trace!(
        "decode_keys: {} ids, {} per chunk, at most {} workers",
        ids.len(),
        chunk_size,
        max_workers
    );

    let tasks = ids.chunks(chunk_size).map(|chunk| {
        let chunk = chunk.to_vec();
        let handle = tokio::spawn(async move { decode_sequential(&chunk) });
        async move {
            handle
                .await
                .map_err(|e| ShortenerError::internal(format!("解码任务异常退出: {}", e)))?
        }
    });

    let decoded = try_join_all(tasks).await?;
    Ok(decoded.into_iter().flatten().collect())
}
