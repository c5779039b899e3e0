use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::UrlStorage;
use super::key::derive_key;
use super::models::{AddResult, StorageStats, UrlLookup, UserUrl};
use crate::errors::{Result, ShortenerError};

/// 内存索引，所有字段只在同一把锁下修改
#[derive(Default)]
struct MemoryIndex {
    /// key → 原始 URL
    urls: HashMap<u64, String>,
    /// 已软删除的 key
    tombstones: HashSet<u64>,
    /// user → 按插入顺序排列的 key；已删除的 key 读取时过滤，不从这里移除
    users: HashMap<u64, Vec<u64>>,
}

impl MemoryIndex {
    fn insert(&mut self, owner_user_id: u64, key: u64, url: &str) -> AddResult {
        // 重新写入已删除的 URL 会让它恢复有效
        self.tombstones.remove(&key);

        if self.urls.contains_key(&key) {
            return AddResult {
                key,
                inserted: false,
            };
        }

        self.urls.insert(key, url.to_owned());
        self.users.entry(owner_user_id).or_default().push(key);

        AddResult {
            key,
            inserted: true,
        }
    }
}

/// 纯内存存储后端
#[derive(Default)]
pub struct InMemoryStorage {
    index: RwLock<MemoryIndex>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, owner_user_id: u64, url: &str) -> AddResult {
        let key = derive_key(url);
        self.index.write().insert(owner_user_id, key, url)
    }

    pub(crate) fn insert_many(&self, owner_user_id: u64, urls: &[String]) -> Vec<AddResult> {
        // 先在锁外计算所有 key
        let keys: Vec<u64> = urls.iter().map(|u| derive_key(u)).collect();

        let mut index = self.index.write();
        keys.into_iter()
            .zip(urls)
            .map(|(key, url)| index.insert(owner_user_id, key, url))
            .collect()
    }

    pub(crate) fn contains(&self, key: u64) -> bool {
        self.index.read().urls.contains_key(&key)
    }

    pub(crate) fn lookup(&self, key: u64) -> UrlLookup {
        let index = self.index.read();
        if index.tombstones.contains(&key) {
            return UrlLookup::Deleted;
        }
        match index.urls.get(&key) {
            Some(url) => UrlLookup::Active(url.clone()),
            None => UrlLookup::Missing,
        }
    }

    pub(crate) fn user_urls(&self, owner_user_id: u64) -> Result<Vec<UserUrl>> {
        let index = self.index.read();
        let keys = index.users.get(&owner_user_id).ok_or_else(|| {
            ShortenerError::not_found(format!("用户不存在: {}", owner_user_id))
        })?;

        Ok(keys
            .iter()
            .filter(|key| !index.tombstones.contains(key))
            .filter_map(|key| {
                index.urls.get(key).map(|url| UserUrl {
                    key: *key,
                    original_url: url.clone(),
                })
            })
            .collect())
    }

    /// 立即把属于该用户的 key 标记为删除，返回实际标记的数量
    pub(crate) fn mark_deleted(&self, owner_user_id: u64, keys: &[u64]) -> Result<usize> {
        // 先在读锁下确认归属，避免把缺失或他人的 key 标记为删除
        let owned: Vec<u64> = {
            let index = self.index.read();
            let user_keys = index.users.get(&owner_user_id).ok_or_else(|| {
                ShortenerError::not_found(format!("用户不存在: {}", owner_user_id))
            })?;
            let user_keys: HashSet<&u64> = user_keys.iter().collect();
            keys.iter()
                .filter(|k| user_keys.contains(k))
                .copied()
                .collect()
        };

        if owned.is_empty() {
            trace!(
                "InMemoryStorage: no owned keys to delete for user {}",
                owner_user_id
            );
            return Ok(0);
        }

        let mut index = self.index.write();
        let mut marked = 0;
        for key in owned {
            if index.tombstones.insert(key) {
                marked += 1;
            }
        }
        debug!(
            "InMemoryStorage: marked {} keys deleted for user {}",
            marked, owner_user_id
        );
        Ok(marked)
    }

    pub(crate) fn snapshot_stats(&self) -> StorageStats {
        let index = self.index.read();
        StorageStats {
            total_urls: index.urls.len().saturating_sub(index.tombstones.len()) as u64,
            total_users: index.users.len() as u64,
        }
    }
}

#[async_trait]
impl UrlStorage for InMemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn add(&self, owner_user_id: u64, url: &str) -> Result<AddResult> {
        Ok(self.insert(owner_user_id, url))
    }

    async fn add_batch(&self, owner_user_id: u64, urls: &[String]) -> Result<Vec<AddResult>> {
        Ok(self.insert_many(owner_user_id, urls))
    }

    async fn get(&self, key: u64) -> Result<UrlLookup> {
        Ok(self.lookup(key))
    }

    async fn get_user_data(&self, owner_user_id: u64) -> Result<Vec<UserUrl>> {
        self.user_urls(owner_user_id)
    }

    async fn delete_batch(&self, owner_user_id: u64, keys: Vec<u64>) -> Result<()> {
        self.mark_deleted(owner_user_id, &keys).map(|_| ())
    }

    async fn stats(&self) -> Result<StorageStats> {
        Ok(self.snapshot_stats())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
