//! 追加写日志文件后端
//!
//! 内存索引是唯一的读路径；日志文件每行一个 `{"<owner>":"<url>"}` 对象，
//! 启动时全部重放。删除只作用于内存，重启后被删除的记录会恢复。

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::UrlStorage;
use super::key::derive_key;
use super::memory::InMemoryStorage;
use super::models::{AddResult, StorageStats, UrlLookup, UserUrl};
use crate::errors::{Result, ShortenerError};

pub struct FileStorage {
    path: PathBuf,
    memory: InMemoryStorage,
    /// 所有写入都在这把锁下完成；关闭后为 None
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileStorage {
    /// 打开（不存在则创建）日志文件并重放已有记录
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ShortenerError::file_operation(format!(
                    "无法创建存储目录 {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let memory = InMemoryStorage::new();
        let replayed = Self::replay(&path, &memory).await?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                ShortenerError::file_operation(format!(
                    "无法打开存储文件 {}: {}",
                    path.display(),
                    e
                ))
            })?;

        info!(
            "FileStorage opened at {} ({} records replayed)",
            path.display(),
            replayed
        );

        Ok(Self {
            path,
            memory,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    async fn replay(path: &Path, memory: &InMemoryStorage) -> Result<usize> {
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(ShortenerError::file_operation(format!(
                    "无法读取存储文件 {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let mut lines = BufReader::new(file).lines();
        let mut count = 0usize;
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record: HashMap<String, String> = serde_json::from_str(line).map_err(|e| {
                ShortenerError::serialization(format!(
                    "存储文件第 {} 行无法解析: {}",
                    line_no, e
                ))
            })?;

            for (owner, url) in record {
                let owner_user_id: u64 = owner.parse().map_err(|_| {
                    ShortenerError::serialization(format!(
                        "存储文件第 {} 行的用户 ID 无效: {}",
                        line_no, owner
                    ))
                })?;
                memory.insert(owner_user_id, &url);
                count += 1;
            }
        }

        Ok(count)
    }

    fn encode_line(owner_user_id: u64, url: &str) -> Result<String> {
        let mut record = HashMap::with_capacity(1);
        record.insert(owner_user_id.to_string(), url);
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        Ok(line)
    }

    /// 写入并同步到磁盘，返回后记录才对读者可见
    async fn append(writer: &mut Option<BufWriter<File>>, payload: &str) -> Result<()> {
        let writer = writer
            .as_mut()
            .ok_or_else(|| ShortenerError::file_operation("存储文件已关闭"))?;

        writer.write_all(payload.as_bytes()).await?;
        writer.flush().await?;
        writer.get_ref().sync_data().await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl UrlStorage for FileStorage {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn add(&self, owner_user_id: u64, url: &str) -> Result<AddResult> {
        let key = derive_key(url);
        let mut writer = self.writer.lock().await;

        if !self.memory.contains(key) {
            let line = Self::encode_line(owner_user_id, url)?;
            Self::append(&mut writer, &line).await.map_err(|e| {
                warn!("FileStorage: append failed for user {}: {}", owner_user_id, e);
                e
            })?;
        }

        Ok(self.memory.insert(owner_user_id, url))
    }

    async fn add_batch(&self, owner_user_id: u64, urls: &[String]) -> Result<Vec<AddResult>> {
        let mut writer = self.writer.lock().await;

        // 只有第一次出现且索引里没有的 URL 才落盘
        let mut pending = HashSet::new();
        let mut payload = String::new();
        for url in urls {
            let key = derive_key(url);
            if !self.memory.contains(key) && pending.insert(key) {
                payload.push_str(&Self::encode_line(owner_user_id, url)?);
            }
        }

        if !payload.is_empty() {
            Self::append(&mut writer, &payload).await?;
            debug!(
                "FileStorage: appended {} records for user {}",
                pending.len(),
                owner_user_id
            );
        }

        Ok(self.memory.insert_many(owner_user_id, urls))
    }

    async fn get(&self, key: u64) -> Result<UrlLookup> {
        Ok(self.memory.lookup(key))
    }

    async fn get_user_data(&self, owner_user_id: u64) -> Result<Vec<UserUrl>> {
        self.memory.user_urls(owner_user_id)
    }

    async fn delete_batch(&self, owner_user_id: u64, keys: Vec<u64>) -> Result<()> {
        self.memory.mark_deleted(owner_user_id, &keys).map(|_| ())
    }

    async fn stats(&self) -> Result<StorageStats> {
        Ok(self.memory.snapshot_stats())
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            writer.flush().await?;
            writer.get_ref().sync_all().await?;
            info!("FileStorage closed: {}", self.path.display());
        }
        Ok(())
    }
}
