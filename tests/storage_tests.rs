//! Storage backend tests
//!
//! The shared contract runs against every backend; the relational backend is
//! exercised on temporary SQLite databases.

use std::sync::Arc;
use std::time::Duration;

use shortener::config::StaticConfig;
use shortener::errors::ShortenerError;
use shortener::storage::{
    DatabaseOptions, DatabaseStorage, DebounceConfig, FileStorage, InMemoryStorage,
    StorageFactory, UrlLookup, UrlStorage, derive_key,
};
use tempfile::TempDir;

fn fast_flush_options() -> DatabaseOptions {
    DatabaseOptions {
        pool_size: 4,
        deletion: DebounceConfig {
            batch_threshold: 1000,
            flush_interval: Duration::from_millis(50),
            flush_timeout: Duration::from_secs(2),
        },
        ..Default::default()
    }
}

fn sqlite_url(dir: &TempDir, name: &str) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join(name).display())
}

async fn sqlite_storage(dir: &TempDir) -> DatabaseStorage {
    DatabaseStorage::connect(&sqlite_url(dir, "feeds.db"), fast_flush_options())
        .await
        .expect("连接 SQLite 失败")
}

/// 删除在后台异步生效，轮询直到可见
async fn wait_for_lookup(storage: &dyn UrlStorage, key: u64, expected: UrlLookup) {
    for _ in 0..100 {
        if storage.get(key).await.unwrap() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("key {:x} never reached {:?}", key, expected);
}

/// 所有后端共同遵守的语义
async fn check_contract(storage: Arc<dyn UrlStorage>) {
    let alice = 1u64;
    let bob = 2u64;

    let first = storage.add(alice, "https://ya.ru").await.unwrap();
    assert!(first.inserted);
    assert_eq!(first.key, derive_key("https://ya.ru"));

    // 同一个 URL 再次写入（哪怕换了用户）只返回已有记录
    let again = storage.add(bob, "https://ya.ru").await.unwrap();
    assert!(again.already_existed());
    assert_eq!(again.key, first.key);

    assert_eq!(
        storage.get(first.key).await.unwrap(),
        UrlLookup::Active("https://ya.ru".to_string())
    );
    assert_eq!(
        storage.get(derive_key("https://never.added")).await.unwrap(),
        UrlLookup::Missing
    );

    let batch = storage
        .add_batch(
            alice,
            &[
                "https://a.example".to_string(),
                "https://ya.ru".to_string(),
                "https://b.example".to_string(),
            ],
        )
        .await
        .unwrap();
    assert_eq!(
        batch.iter().map(|r| r.inserted).collect::<Vec<_>>(),
        vec![true, false, true]
    );
    assert_eq!(batch[0].key, derive_key("https://a.example"));

    let urls: Vec<String> = storage
        .get_user_data(alice)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.original_url)
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://ya.ru".to_string(),
            "https://a.example".to_string(),
            "https://b.example".to_string(),
        ]
    );

    // bob 没有写入成功过任何记录
    assert!(storage.get_user_data(bob).await.unwrap_err().is_not_found());

    let stats = storage.stats().await.unwrap();
    assert_eq!(stats.total_urls, 3);
    assert_eq!(stats.total_users, 1);

    storage.ping().await.unwrap();
}

#[tokio::test]
async fn test_memory_contract() {
    check_contract(Arc::new(InMemoryStorage::new())).await;
}

#[tokio::test]
async fn test_file_contract() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::open(dir.path().join("urls.log")).await.unwrap();
    check_contract(Arc::new(storage)).await;
}

#[tokio::test]
async fn test_sqlite_contract() {
    let dir = TempDir::new().unwrap();
    let storage = sqlite_storage(&dir).await;
    assert_eq!(storage.backend_name(), "sqlite");
    check_contract(Arc::new(storage)).await;
}

#[tokio::test]
async fn test_file_storage_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/urls.log");

    {
        let storage = FileStorage::open(&path).await.unwrap();
        storage.add(7, "https://one.example").await.unwrap();
        storage
            .add_batch(7, &["https://two.example".to_string()])
            .await
            .unwrap();
        storage.close().await.unwrap();
    }

    let reopened = FileStorage::open(&path).await.unwrap();
    let urls: Vec<String> = reopened
        .get_user_data(7)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.original_url)
        .collect();
    assert_eq!(urls, vec!["https://one.example", "https://two.example"]);
    assert!(
        !reopened
            .add(7, "https://one.example")
            .await
            .unwrap()
            .inserted
    );
}

#[tokio::test]
async fn test_sqlite_delete_is_applied_asynchronously() {
    let dir = TempDir::new().unwrap();
    let storage = sqlite_storage(&dir).await;

    let kept = storage.add(10, "https://kept.example").await.unwrap().key;
    let gone = storage.add(10, "https://gone.example").await.unwrap().key;

    storage.delete_batch(10, vec![gone]).await.unwrap();
    wait_for_lookup(&storage, gone, UrlLookup::Deleted).await;

    assert_eq!(
        storage.get(kept).await.unwrap(),
        UrlLookup::Active("https://kept.example".to_string())
    );
    let remaining = storage.get_user_data(10).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].key, kept);

    let stats = storage.stats().await.unwrap();
    assert_eq!(stats.total_urls, 1);
    assert_eq!(stats.total_users, 1);

    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_sqlite_delete_ignores_keys_of_other_owners() {
    let dir = TempDir::new().unwrap();
    let storage = sqlite_storage(&dir).await;

    let alice_key = storage.add(1, "https://alice.example").await.unwrap().key;
    let bob_key = storage.add(2, "https://bob.example").await.unwrap().key;

    // bob 试图删除 alice 的链接，同时删除自己的
    storage
        .delete_batch(2, vec![alice_key, bob_key])
        .await
        .unwrap();
    wait_for_lookup(&storage, bob_key, UrlLookup::Deleted).await;

    assert_eq!(
        storage.get(alice_key).await.unwrap(),
        UrlLookup::Active("https://alice.example".to_string())
    );

    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_sqlite_unknown_owner_and_all_deleted_owner() {
    let dir = TempDir::new().unwrap();
    let storage = sqlite_storage(&dir).await;

    assert!(
        storage
            .delete_batch(404, vec![1, 2, 3])
            .await
            .unwrap_err()
            .is_not_found()
    );

    let key = storage.add(5, "https://only.example").await.unwrap().key;
    storage.delete_batch(5, vec![key]).await.unwrap();
    wait_for_lookup(&storage, key, UrlLookup::Deleted).await;

    // 所有记录都删除后用户仍然存在
    assert!(storage.get_user_data(5).await.unwrap().is_empty());

    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_sqlite_close_drains_pending_deletions() {
    let dir = TempDir::new().unwrap();
    let url = sqlite_url(&dir, "drain.db");

    let options = DatabaseOptions {
        deletion: DebounceConfig {
            batch_threshold: 1000,
            flush_interval: Duration::from_secs(3600),
            flush_timeout: Duration::from_secs(2),
        },
        ..Default::default()
    };

    let key = {
        let storage = DatabaseStorage::connect(&url, options.clone()).await.unwrap();
        let key = storage.add(3, "https://drain.example").await.unwrap().key;
        storage.delete_batch(3, vec![key]).await.unwrap();
        // 刷盘周期很长，只有关闭时才会写入
        storage.close().await.unwrap();
        // 再次关闭是空操作
        storage.close().await.unwrap();
        key
    };

    let reopened = DatabaseStorage::connect(&url, options).await.unwrap();
    assert_eq!(reopened.get(key).await.unwrap(), UrlLookup::Deleted);
    // 被删除的 URL 重新写入仍然保持删除状态
    assert!(
        reopened
            .add(3, "https://drain.example")
            .await
            .unwrap()
            .already_existed()
    );
    assert_eq!(reopened.get(key).await.unwrap(), UrlLookup::Deleted);
    reopened.close().await.unwrap();
}

#[tokio::test]
async fn test_sqlite_user_ids_above_i64_max() {
    let dir = TempDir::new().unwrap();
    let storage = sqlite_storage(&dir).await;

    let owner = u64::MAX - 1;
    storage.add(owner, "https://big.example").await.unwrap();
    let urls = storage.get_user_data(owner).await.unwrap();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].key, derive_key("https://big.example"));

    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_factory_selects_backend() {
    let dir = TempDir::new().unwrap();

    let memory = StorageFactory::create(&StaticConfig::default())
        .await
        .unwrap();
    assert_eq!(memory.backend_name(), "memory");

    let mut config = StaticConfig::default();
    config.storage.file_storage_path = Some(dir.path().join("f.log").display().to_string());
    let file = StorageFactory::create(&config).await.unwrap();
    assert_eq!(file.backend_name(), "file");
    file.close().await.unwrap();

    // database_url 优先于 file_storage_path
    config.storage.database_url = Some(sqlite_url(&dir, "factory.db"));
    let db = StorageFactory::create(&config).await.unwrap();
    assert_eq!(db.backend_name(), "sqlite");
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_factory_rejects_zero_durations() {
    let mut config = StaticConfig::default();
    config.deletion.flush_interval_secs = 0;
    let err = StorageFactory::create(&config).await.err().unwrap();
    assert!(matches!(err, ShortenerError::DatabaseConfig(_)));

    let mut config = StaticConfig::default();
    config.storage.operation_timeout_ms = 0;
    let err = StorageFactory::create(&config).await.err().unwrap();
    assert!(matches!(err, ShortenerError::DatabaseConfig(_)));
}
