use std::time::Duration;

use tokio::time::timeout;
use tracing::{error, info};

use crate::services::UrlShortener;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// HTTP 服务停止后关闭后端（关系数据库会先刷完删除队列）
pub async fn close_shortener(shortener: &UrlShortener) {
    info!("Shutting down, closing {} backend...", shortener.backend_name());

    match timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), shortener.close()).await {
        Ok(Ok(())) => info!("All shutdown tasks completed successfully"),
        Ok(Err(e)) => error!("Failed to close storage: {}", e.format_simple()),
        Err(_) => error!(
            "Shutdown tasks timed out after {} seconds",
            SHUTDOWN_TIMEOUT_SECS
        ),
    }
}
