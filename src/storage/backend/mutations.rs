//! Insert operations for DatabaseStorage

use chrono::Utc;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ConnectionTrait, DbErr, EntityTrait, TransactionTrait,
    sea_query::OnConflict,
};
use tracing::{debug, info};

use super::{DatabaseStorage, key_to_db, retry};
use crate::errors::{Result, ShortenerError};
use crate::storage::key::derive_key;
use crate::storage::models::AddResult;

use migration::entities::{FeedState, feed};

fn new_feed(owner_user_id: u64, url: &str, key: u64) -> feed::ActiveModel {
    feed::ActiveModel {
        id: NotSet,
        url_hash: Set(key_to_db(key)),
        url: Set(url.to_owned()),
        owner_user_id: Set(owner_user_id as i64),
        created_at: Set(Utc::now()),
        state: Set(FeedState::Active),
    }
}

/// 按 url 去重插入，返回是否新建了记录
async fn insert_ignoring_existing<C>(
    conn: &C,
    owner_user_id: u64,
    url: &str,
) -> std::result::Result<AddResult, DbErr>
where
    C: ConnectionTrait,
{
    let key = derive_key(url);
    let rows = match feed::Entity::insert(new_feed(owner_user_id, url, key))
        .on_conflict(OnConflict::column(feed::Column::Url).do_nothing().to_owned())
        .exec_without_returning(conn)
        .await
    {
        Ok(rows) => rows,
        // 部分驱动在 do_nothing 命中冲突时报告未插入
        Err(DbErr::RecordNotInserted) => 0,
        Err(e) => return Err(e),
    };

    Ok(AddResult {
        key,
        inserted: rows > 0,
    })
}

impl DatabaseStorage {
    pub(super) async fn insert_feed(&self, owner_user_id: u64, url: &str) -> Result<AddResult> {
        let db = &self.db;

        let result = retry::with_write_retry("insert_feed", self.retry_config, || async {
            insert_ignoring_existing(db, owner_user_id, url).await
        })
        .await
        .map_err(|e| ShortenerError::database_operation(format!("写入短链接失败: {}", e)))?;

        debug!(
            "insert_feed: user={} key={:x} inserted={}",
            owner_user_id, result.key, result.inserted
        );
        Ok(result)
    }

    /// 批量插入（单个事务）
    pub(super) async fn insert_feeds(
        &self,
        owner_user_id: u64,
        urls: &[String],
    ) -> Result<Vec<AddResult>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| ShortenerError::database_operation(format!("开始事务失败: {}", e)))?;

        let mut results = Vec::with_capacity(urls.len());
        for url in urls {
            let result = insert_ignoring_existing(&txn, owner_user_id, url)
                .await
                .map_err(|e| {
                    ShortenerError::database_operation(format!("批量写入失败: {}", e))
                })?;
            results.push(result);
        }

        txn.commit()
            .await
            .map_err(|e| ShortenerError::database_operation(format!("提交事务失败: {}", e)))?;

        let inserted = results.iter().filter(|r| r.inserted).count();
        info!(
            "Batch inserted {} of {} feeds for user {}",
            inserted,
            urls.len(),
            owner_user_id
        );
        Ok(results)
    }
}
