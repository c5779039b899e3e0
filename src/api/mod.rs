//! HTTP 前端（actix-web）
//!
//! 只做协议适配：解析请求、维护身份 Cookie、把 `ShortenerError` 映射成状态码。

pub mod constants;
pub mod identity;
pub mod services;

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{HttpMessage, HttpRequest, HttpResponse, web};
use tracing::{debug, error};

use crate::config::ServerConfig;
use crate::errors::{Result, ShortenerError};
use crate::services::UrlShortener;
use crate::utils::TrustedSubnet;

pub use services::{
    HealthService, RedirectService, ShortenService, UserUrlsService, health_routes,
    redirect_routes, shorten_routes, user_urls_routes,
};

/// 所有 handler 共享的状态
#[derive(Clone)]
pub struct AppState {
    pub shortener: Arc<UrlShortener>,
    base_url: Option<String>,
    trusted_subnet: Option<TrustedSubnet>,
}

impl AppState {
    pub fn new(
        shortener: Arc<UrlShortener>,
        base_url: Option<String>,
        trusted_subnet: Option<TrustedSubnet>,
    ) -> Self {
        let base_url = base_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());
        Self {
            shortener,
            base_url,
            trusted_subnet,
        }
    }

    /// trusted_subnet 解析失败视为配置错误
    pub fn from_config(shortener: Arc<UrlShortener>, server: &ServerConfig) -> Result<Self> {
        let trusted_subnet = server
            .trusted_subnet
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<TrustedSubnet>)
            .transpose()?;
        Ok(Self::new(shortener, server.base_url.clone(), trusted_subnet))
    }

    /// `{base_url}/{id}`；未配置 base_url 时使用请求的 scheme 和 Host
    pub fn short_url(&self, req: &HttpRequest, short_id: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}/{}", base, short_id),
            None => {
                let info = req.connection_info();
                format!("{}://{}/{}", info.scheme(), info.host(), short_id)
            }
        }
    }

    pub fn trusted_subnet(&self) -> Option<&TrustedSubnet> {
        self.trusted_subnet.as_ref()
    }
}

/// 注册全部路由；`/{id}` 必须最后注册
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(health_routes)
        .configure(shorten_routes)
        .configure(user_urls_routes)
        .configure(redirect_routes);
}

const JSON_CONTENT_TYPE: &str = "application/json";

/// JSON 接口要求 `Content-Type: application/json`
pub(crate) fn require_json(req: &HttpRequest) -> Result<()> {
    if req.content_type() == JSON_CONTENT_TYPE {
        Ok(())
    } else {
        Err(ShortenerError::client_input(format!(
            "Content-Type 必须为 application/json，实际为 '{}'",
            req.content_type()
        )))
    }
}

/// 错误 → 纯文本响应，服务端错误记 error 日志
pub(crate) fn error_response(err: &ShortenerError) -> HttpResponse {
    error_response_with(err.http_status(), err)
}

pub(crate) fn error_response_with(status: StatusCode, err: &ShortenerError) -> HttpResponse {
    if status.is_server_error() {
        error!("{}", err.format_simple());
    } else {
        debug!("{} ({})", err.format_simple(), status.as_u16());
    }
    HttpResponse::build(status)
        .content_type("text/plain; charset=utf-8")
        .body(err.message().to_string())
}
