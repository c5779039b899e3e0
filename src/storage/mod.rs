//! 存储引擎
//!
//! 三种后端实现同一个 [`UrlStorage`] 契约：
//! - [`InMemoryStorage`]：单锁保护的内存索引
//! - [`FileStorage`]：内存索引 + 追加写日志文件
//! - [`DatabaseStorage`]：SeaORM 关系数据库，删除经由 [`DeletionDebouncer`] 异步批量应用

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::StaticConfig;
use crate::errors::Result;

pub mod backend;
pub mod deletion;
pub mod file;
pub mod key;
pub mod memory;
pub mod models;

pub use backend::{DatabaseOptions, DatabaseStorage};
pub use deletion::{DebounceConfig, DeletionDebouncer, DeletionSink};
pub use file::FileStorage;
pub use key::{decode_key, derive_key, encode_key};
pub use memory::InMemoryStorage;
pub use models::{AddResult, DeletionRequest, StorageStats, UrlLookup, UserUrl};

/// 所有存储后端共同实现的契约
#[async_trait]
pub trait UrlStorage: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// 写入单个 URL；同一 key 已存在时返回 `inserted = false` 且不改动调用者的索引
    async fn add(&self, owner_user_id: u64, url: &str) -> Result<AddResult>;

    /// 批量写入，逐条语义与 `add` 相同，结果顺序与输入一致
    async fn add_batch(&self, owner_user_id: u64, urls: &[String]) -> Result<Vec<AddResult>>;

    async fn get(&self, key: u64) -> Result<UrlLookup>;

    /// 用户名下所有有效记录（按插入顺序）；从未写入过的用户返回 `NotFound`
    async fn get_user_data(&self, owner_user_id: u64) -> Result<Vec<UserUrl>>;

    /// 软删除；不属于该用户的 key 被静默忽略
    async fn delete_batch(&self, owner_user_id: u64, keys: Vec<u64>) -> Result<()>;

    async fn stats(&self) -> Result<StorageStats>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// 刷盘并释放资源，进程退出前调用一次
    async fn close(&self) -> Result<()>;
}

pub struct StorageFactory;

impl StorageFactory {
    /// 按配置选择后端：database_url > file_storage_path > 内存
    pub async fn create(config: &StaticConfig) -> Result<Arc<dyn UrlStorage>> {
        config.validate()?;
        let storage = &config.storage;

        if let Some(database_url) = storage.database_url.as_deref().filter(|s| !s.is_empty()) {
            let options = DatabaseOptions {
                pool_size: storage.pool_size,
                retry: backend::retry::RetryConfig {
                    max_retries: storage.retry_count,
                    base_delay_ms: storage.retry_base_delay_ms,
                    max_delay_ms: storage.retry_max_delay_ms,
                },
                deletion: DebounceConfig {
                    batch_threshold: config.deletion.batch_threshold,
                    flush_interval: Duration::from_secs(config.deletion.flush_interval_secs),
                    flush_timeout: Duration::from_millis(config.deletion.flush_timeout_ms),
                },
            };
            let db = DatabaseStorage::connect(database_url, options).await?;
            return Ok(Arc::new(db));
        }

        if let Some(path) = storage
            .file_storage_path
            .as_deref()
            .filter(|s| !s.is_empty())
        {
            let file = FileStorage::open(path).await?;
            return Ok(Arc::new(file));
        }

        info!("No persistent storage configured, using in-memory storage");
        Ok(Arc::new(InMemoryStorage::new()))
    }
}
