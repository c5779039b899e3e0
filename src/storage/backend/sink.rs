use sea_orm::{
    ActiveEnum, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
    sea_query::Expr,
};
use tracing::debug;

use super::key_to_db;
use crate::storage::deletion::DeletionSink;

use migration::entities::{FeedState, feed};

/// 把合并后的删除请求写入 feeds 表
pub struct FeedsDeletionSink {
    db: DatabaseConnection,
}

impl FeedsDeletionSink {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl DeletionSink for FeedsDeletionSink {
    async fn apply_deletions(&self, owner_user_id: u64, keys: &[u64]) -> anyhow::Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let txn = self.db.begin().await?;

        // owner 条件保证只能删除自己的记录
        let result = feed::Entity::update_many()
            .col_expr(feed::Column::State, Expr::value(FeedState::Disabled.to_value()))
            .filter(feed::Column::OwnerUserId.eq(owner_user_id as i64))
            .filter(feed::Column::UrlHash.is_in(keys.iter().map(|k| key_to_db(*k))))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        debug!(
            "Disabled {} feeds for user {} ({} keys requested)",
            result.rows_affected,
            owner_user_id,
            keys.len()
        );
        Ok(())
    }
}
