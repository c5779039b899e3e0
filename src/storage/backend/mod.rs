//! SeaORM storage backend
//!
//! Persists feeds in SQLite, MySQL/MariaDB or PostgreSQL. Reads and inserts go
//! straight to the database; deletions are handed to a [`DeletionDebouncer`]
//! and applied in batches.

mod connection;
mod mutations;
mod query;
pub mod retry;
mod sink;

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use super::UrlStorage;
use super::deletion::{DebounceConfig, DeletionDebouncer};
use super::models::{AddResult, DeletionRequest, StorageStats, UrlLookup, UserUrl};
use crate::errors::{Result, ShortenerError};

pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use sink::FeedsDeletionSink;

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<&'static str> {
    if database_url.starts_with("sqlite:")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite")
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql")
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres")
    } else {
        Err(ShortenerError::database_config(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// 64 位 key 与数据库 BIGINT 列之间按位转换
#[inline]
pub(crate) fn key_to_db(key: u64) -> i64 {
    key as i64
}

#[inline]
pub(crate) fn key_from_db(value: i64) -> u64 {
    value as u64
}

#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub pool_size: u32,
    pub retry: retry::RetryConfig,
    pub deletion: DebounceConfig,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            pool_size: 10,
            retry: retry::RetryConfig::default(),
            deletion: DebounceConfig::default(),
        }
    }
}

pub struct DatabaseStorage {
    db: DatabaseConnection,
    backend_name: &'static str,
    retry_config: retry::RetryConfig,
    debouncer: DeletionDebouncer,
}

impl DatabaseStorage {
    /// 连接数据库、执行迁移并启动删除 worker
    pub async fn connect(database_url: &str, options: DatabaseOptions) -> Result<Self> {
        if database_url.is_empty() {
            return Err(ShortenerError::database_config("DATABASE_URL 未设置"));
        }

        let backend_name = infer_backend_from_url(database_url)?;
        let db = if backend_name == "sqlite" {
            connect_sqlite(database_url, options.pool_size).await?
        } else {
            connect_generic(database_url, backend_name, options.pool_size).await?
        };

        run_migrations(&db).await?;

        let storage = Self::from_connection(db, backend_name, options);
        warn!("{} Storage initialized.", backend_name.to_uppercase());
        Ok(storage)
    }

    /// 基于已建立（且已迁移）的连接构造
    pub fn from_connection(
        db: DatabaseConnection,
        backend_name: &'static str,
        options: DatabaseOptions,
    ) -> Self {
        let sink = Arc::new(FeedsDeletionSink::new(db.clone()));
        let debouncer = DeletionDebouncer::spawn(sink, options.deletion);

        Self {
            db,
            backend_name,
            retry_config: options.retry,
            debouncer,
        }
    }
}

#[async_trait]
impl UrlStorage for DatabaseStorage {
    fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    async fn add(&self, owner_user_id: u64, url: &str) -> Result<AddResult> {
        self.insert_feed(owner_user_id, url).await
    }

    async fn add_batch(&self, owner_user_id: u64, urls: &[String]) -> Result<Vec<AddResult>> {
        self.insert_feeds(owner_user_id, urls).await
    }

    async fn get(&self, key: u64) -> Result<UrlLookup> {
        self.find_by_key(key).await
    }

    async fn get_user_data(&self, owner_user_id: u64) -> Result<Vec<UserUrl>> {
        self.active_feeds_of(owner_user_id).await
    }

    async fn delete_batch(&self, owner_user_id: u64, keys: Vec<u64>) -> Result<()> {
        if !self.owner_exists(owner_user_id).await? {
            return Err(ShortenerError::not_found(format!(
                "用户不存在: {}",
                owner_user_id
            )));
        }

        self.debouncer.enqueue(DeletionRequest {
            owner_user_id,
            keys,
        })
    }

    async fn stats(&self) -> Result<StorageStats> {
        self.feed_stats().await
    }

    async fn ping(&self) -> Result<()> {
        self.db.ping().await.map_err(|e| {
            ShortenerError::database_connection(format!("数据库不可用: {}", e))
        })
    }

    async fn close(&self) -> Result<()> {
        if self.debouncer.is_closed() {
            return Ok(());
        }

        self.debouncer.shutdown().await;
        self.db
            .clone()
            .close()
            .await
            .map_err(|e| ShortenerError::database_connection(format!("关闭数据库失败: {}", e)))?;

        info!("{} Storage closed.", self.backend_name.to_uppercase());
        Ok(())
    }
}
