//! 数据库写读的有限重试
//!
//! 只有连接类错误和锁冲突（死锁、锁等待超时、SQLite BUSY）会被重试；
//! 约束冲突、数据错误等立即返回。
//! 写操作不是幂等的：连接在语句发出后断开时无法知道是否已提交，
//! 因此写入只重试尚未发出语句的取连接失败和已回滚的锁冲突。

use std::future::Future;
use std::time::Duration;

use sea_orm::DbErr;
use sea_orm::error::RuntimeErr;
use tracing::{debug, warn};

/// 各数据库锁冲突对应的错误码
/// MySQL 1213/1205，PostgreSQL 40001/40P01，SQLite BUSY/LOCKED
const RETRYABLE_CODES: &[&str] = &["1213", "1205", "40001", "40P01", "5", "6"];

const RETRYABLE_MESSAGES: &[&str] = &[
    "deadlock",
    "lock wait timeout",
    "database is locked",
    "serialization failure",
];

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

impl RetryConfig {
    /// 第 `attempt` 次重试前的等待时间（attempt 从 1 开始），带 0-25% 抖动
    fn backoff(&self, attempt: u32) -> Duration {
        use rand::RngExt;

        let exp = self
            .base_delay_ms
            .saturating_mul(1u64 << (attempt.saturating_sub(1)).min(32));
        let capped = exp.min(self.max_delay_ms);
        let jitter = rand::rng().random_range(0..=capped / 4);
        Duration::from_millis(capped.saturating_add(jitter))
    }
}

pub fn is_retryable(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(runtime) | DbErr::Query(runtime) => is_retryable_runtime(runtime),
        _ => false,
    }
}

/// 写入可安全重试的错误：语句未发出，或数据库已回滚
pub fn is_retryable_write(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) => true,
        DbErr::Exec(runtime) | DbErr::Query(runtime) => is_retryable_runtime(runtime),
        _ => false,
    }
}

fn is_retryable_runtime(err: &RuntimeErr) -> bool {
    match err {
        RuntimeErr::SqlxError(sqlx_err) => {
            use std::ops::Deref;
            let code = sqlx_err
                .deref()
                .as_database_error()
                .and_then(|db_err| db_err.code().map(|c| c.into_owned()));
            match code {
                Some(code) => RETRYABLE_CODES.contains(&code.as_str()),
                None => message_is_retryable(&sqlx_err.to_string()),
            }
        }
        RuntimeErr::Internal(msg) => message_is_retryable(msg),
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

fn message_is_retryable(message: &str) -> bool {
    let message = message.to_lowercase();
    RETRYABLE_MESSAGES.iter().any(|m| message.contains(m))
}

/// 执行读操作，遇到可重试错误时按指数退避重试
pub async fn with_retry<T, F, Fut>(
    name: &str,
    config: RetryConfig,
    operation: F,
) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    retry_when(name, config, is_retryable, operation).await
}

/// 执行写操作，只重试 [`is_retryable_write`] 认可的错误
pub async fn with_write_retry<T, F, Fut>(
    name: &str,
    config: RetryConfig,
    operation: F,
) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    retry_when(name, config, is_retryable_write, operation).await
}

async fn retry_when<T, F, Fut>(
    name: &str,
    config: RetryConfig,
    retryable: fn(&DbErr) -> bool,
    mut operation: F,
) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("'{}' succeeded after {} retries", name, attempt);
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !retryable(&err) || attempt >= config.max_retries {
            debug!("'{}' failed after {} attempts: {}", name, attempt + 1, err);
            return Err(err);
        }

        attempt += 1;
        let delay = config.backoff(attempt);
        warn!(
            "'{}' failed (attempt {}/{}): {}; retrying in {:?}",
            name,
            attempt,
            config.max_retries + 1,
            err,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}
