//! Query operations for DatabaseStorage
//!
//! This module contains all read-only database operations.

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use tracing::trace;

use super::{DatabaseStorage, key_from_db, key_to_db, retry};
use crate::errors::{Result, ShortenerError};
use crate::storage::models::{StorageStats, UrlLookup, UserUrl};

use migration::entities::{FeedState, feed};

impl DatabaseStorage {
    /// 碰撞时取最早写入的记录
    pub(super) async fn find_by_key(&self, key: u64) -> Result<UrlLookup> {
        let db = &self.db;

        let model = retry::with_retry("find_by_key", self.retry_config, || async {
            feed::Entity::find()
                .filter(feed::Column::UrlHash.eq(key_to_db(key)))
                .order_by_asc(feed::Column::Id)
                .one(db)
                .await
        })
        .await
        .map_err(|e| ShortenerError::database_operation(format!("查询短链接失败: {}", e)))?;

        Ok(match model {
            Some(m) if m.state == FeedState::Active => UrlLookup::Active(m.url),
            Some(_) => UrlLookup::Deleted,
            None => UrlLookup::Missing,
        })
    }

    pub(super) async fn active_feeds_of(&self, owner_user_id: u64) -> Result<Vec<UserUrl>> {
        let models = feed::Entity::find()
            .filter(feed::Column::OwnerUserId.eq(owner_user_id as i64))
            .filter(feed::Column::State.eq(FeedState::Active))
            .order_by_asc(feed::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| ShortenerError::database_operation(format!("查询用户链接失败: {}", e)))?;

        // 所有记录都已删除的用户仍然是已知用户
        if models.is_empty() && !self.owner_exists(owner_user_id).await? {
            return Err(ShortenerError::not_found(format!(
                "用户不存在: {}",
                owner_user_id
            )));
        }

        trace!(
            "active_feeds_of: user={} count={}",
            owner_user_id,
            models.len()
        );
        Ok(models
            .into_iter()
            .map(|m| UserUrl {
                key: key_from_db(m.url_hash),
                original_url: m.url,
            })
            .collect())
    }

    /// 用户是否写入过任何记录（包括已删除的）
    pub(super) async fn owner_exists(&self, owner_user_id: u64) -> Result<bool> {
        let found = feed::Entity::find()
            .select_only()
            .column(feed::Column::Id)
            .filter(feed::Column::OwnerUserId.eq(owner_user_id as i64))
            .into_tuple::<i64>()
            .one(&self.db)
            .await
            .map_err(|e| ShortenerError::database_operation(format!("查询用户失败: {}", e)))?;

        Ok(found.is_some())
    }

    pub(super) async fn feed_stats(&self) -> Result<StorageStats> {
        let total_urls = feed::Entity::find()
            .filter(feed::Column::State.eq(FeedState::Active))
            .count(&self.db)
            .await
            .map_err(|e| ShortenerError::database_operation(format!("统计链接失败: {}", e)))?;

        let total_users = feed::Entity::find()
            .select_only()
            .column(feed::Column::OwnerUserId)
            .distinct()
            .count(&self.db)
            .await
            .map_err(|e| ShortenerError::database_operation(format!("统计用户失败: {}", e)))?;

        Ok(StorageStats {
            total_urls,
            total_users,
        })
    }
}
