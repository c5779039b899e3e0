use serde::{Deserialize, Serialize};

/// 单个 URL 写入的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddResult {
    pub key: u64,
    /// true 表示本次调用创建了记录；false 表示记录已存在（内容去重）
    pub inserted: bool,
}

impl AddResult {
    pub fn already_existed(&self) -> bool {
        !self.inserted
    }
}

/// 用户名下的一条有效记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUrl {
    pub key: u64,
    pub original_url: String,
}

/// 按 key 查询的三种结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlLookup {
    Active(String),
    Deleted,
    Missing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub total_urls: u64,
    pub total_users: u64,
}

/// 排队等待异步应用的删除请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    pub owner_user_id: u64,
    pub keys: Vec<u64>,
}
