//! URL shortening service
//!
//! Composes a storage backend and the identity codec. Every backend call runs
//! under the configured operation timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use super::batch_decode::{MAX_WORKERS_PER_REQUEST, decode_keys};
use crate::config::StaticConfig;
use crate::errors::{Result, ShortenerError};
use crate::identity::{Identity, IdentityCodec};
use crate::storage::{StorageStats, UrlLookup, UrlStorage, decode_key, encode_key};

#[derive(Debug, Clone)]
pub struct ShortenerOptions {
    pub operation_timeout: Duration,
    pub max_decode_workers: usize,
}

impl Default for ShortenerOptions {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(5),
            max_decode_workers: MAX_WORKERS_PER_REQUEST,
        }
    }
}

impl ShortenerOptions {
    pub fn from_config(config: &StaticConfig) -> Self {
        Self {
            operation_timeout: config.storage.operation_timeout(),
            max_decode_workers: config.shortener.max_decode_workers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortenResult {
    pub key: u64,
    /// 对外的短 ID
    pub short_id: String,
    pub already_existed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserUrlView {
    pub short_id: String,
    pub original_url: String,
}

/// 校验 URL 并返回去掉首尾空白后的原文
///
/// 存储的是原文而不是规范化后的 URL，保证 resolve 原样返回。
pub fn validate_url(raw: &str) -> Result<&str> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(ShortenerError::client_input("URL 不能为空"));
    }

    let parsed = Url::parse(url)?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(ShortenerError::client_input(format!(
            "URL 缺少主机名: {}",
            url
        ))),
    }
}

pub struct UrlShortener {
    storage: Arc<dyn UrlStorage>,
    codec: IdentityCodec,
    options: ShortenerOptions,
}

impl UrlShortener {
    /// 使用随机生成的身份密钥
    pub fn new(storage: Arc<dyn UrlStorage>, options: ShortenerOptions) -> Self {
        Self::with_codec(storage, IdentityCodec::generate(), options)
    }

    pub fn with_codec(
        storage: Arc<dyn UrlStorage>,
        codec: IdentityCodec,
        options: ShortenerOptions,
    ) -> Self {
        info!(
            "UrlShortener ready (backend={}, timeout={:?}, decode_workers={})",
            storage.backend_name(),
            options.operation_timeout,
            options.max_decode_workers
        );
        Self {
            storage,
            codec,
            options,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.storage.backend_name()
    }

    async fn with_deadline<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = self.options.operation_timeout;
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} timed out after {:?}", operation, timeout);
                Err(ShortenerError::timeout(format!(
                    "{} 超时 ({:?})",
                    operation, timeout
                )))
            }
        }
    }

    pub async fn shorten(&self, owner_user_id: u64, raw_url: &str) -> Result<ShortenResult> {
        let url = validate_url(raw_url)?;

        let added = self
            .with_deadline("shorten", self.storage.add(owner_user_id, url))
            .await?;

        debug!(
            "shorten: user={} key={:x} existed={}",
            owner_user_id,
            added.key,
            added.already_existed()
        );
        Ok(ShortenResult {
            key: added.key,
            short_id: encode_key(added.key),
            already_existed: added.already_existed(),
        })
    }

    /// 结果与输入一一对应；任一 URL 非法时不写入任何记录
    pub async fn batch_shorten(
        &self,
        owner_user_id: u64,
        raw_urls: &[String],
    ) -> Result<Vec<ShortenResult>> {
        let urls = raw_urls
            .iter()
            .map(|raw| validate_url(raw).map(str::to_owned))
            .collect::<Result<Vec<String>>>()?;

        let added = self
            .with_deadline("batch_shorten", self.storage.add_batch(owner_user_id, &urls))
            .await?;

        Ok(added
            .into_iter()
            .map(|a| ShortenResult {
                key: a.key,
                short_id: encode_key(a.key),
                already_existed: a.already_existed(),
            })
            .collect())
    }

    /// 短 ID → 原始 URL；已删除返回 `Deleted`，不存在返回 `NotFound`
    pub async fn resolve(&self, short_id: &str) -> Result<String> {
        let key = decode_key(short_id)?;

        match self.with_deadline("resolve", self.storage.get(key)).await? {
            UrlLookup::Active(url) => Ok(url),
            UrlLookup::Deleted => Err(ShortenerError::deleted(format!(
                "短链接已删除: {}",
                short_id
            ))),
            UrlLookup::Missing => Err(ShortenerError::not_found(format!(
                "短链接不存在: {}",
                short_id
            ))),
        }
    }

    pub async fn list_user_urls(&self, owner_user_id: u64) -> Result<Vec<UserUrlView>> {
        let urls = self
            .with_deadline("list_user_urls", self.storage.get_user_data(owner_user_id))
            .await?;

        Ok(urls
            .into_iter()
            .map(|u| UserUrlView {
                short_id: encode_key(u.key),
                original_url: u.original_url,
            })
            .collect())
    }

    /// 接受删除请求；关系数据库后端异步生效
    pub async fn delete_user_urls(
        &self,
        owner_user_id: u64,
        short_ids: Vec<String>,
    ) -> Result<()> {
        let count = short_ids.len();
        let keys = decode_keys(short_ids, self.options.max_decode_workers).await?;

        self.with_deadline(
            "delete_user_urls",
            self.storage.delete_batch(owner_user_id, keys),
        )
        .await?;

        debug!(
            "delete_user_urls: accepted {} ids for user {}",
            count, owner_user_id
        );
        Ok(())
    }

    pub async fn stats(&self) -> Result<StorageStats> {
        self.with_deadline("stats", self.storage.stats()).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.with_deadline("ping", self.storage.ping()).await
    }

    /// 关闭后端（关系数据库会先等待删除队列刷盘）
    pub async fn close(&self) -> Result<()> {
        self.storage.close().await?;
        info!("UrlShortener closed ({})", self.backend_name());
        Ok(())
    }

    pub fn encode_identity(&self, user_id: u64) -> Result<String> {
        self.codec.encode(user_id)
    }

    pub fn decode_identity(&self, token: Option<&str>) -> Result<Identity> {
        self.codec.decode(token)
    }
}
