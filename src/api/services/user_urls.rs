use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::Serialize;
use tracing::debug;

use super::shorten::parse_json;
use crate::api::identity::{attach_identity, request_identity};
use crate::api::{AppState, error_response, error_response_with, require_json};
use crate::errors::ShortenerError;

#[derive(Debug, Serialize)]
pub struct UserUrlItem {
    pub short_url: String,
    pub original_url: String,
}

pub struct UserUrlsService;

impl UserUrlsService {
    /// `GET /api/user/urls`
    pub async fn list(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
        let shortener = &state.shortener;
        let identity = match request_identity(&req, shortener) {
            Ok(identity) => identity,
            Err(e) => return error_response(&e),
        };

        if identity.fresh {
            let mut builder = HttpResponse::build(StatusCode::NO_CONTENT);
            if let Err(e) = attach_identity(&mut builder, shortener, &identity) {
                return error_response(&e);
            }
            return builder.finish();
        }

        match shortener.list_user_urls(identity.user_id).await {
            Ok(urls) => {
                let items: Vec<UserUrlItem> = urls
                    .into_iter()
                    .map(|u| UserUrlItem {
                        short_url: state.short_url(&req, &u.short_id),
                        original_url: u.original_url,
                    })
                    .collect();
                HttpResponse::Ok().json(items)
            }
            Err(ShortenerError::NotFound(_)) => {
                debug!("User {} has no urls", identity.user_id);
                HttpResponse::NoContent().finish()
            }
            Err(e) => error_response_with(StatusCode::INTERNAL_SERVER_ERROR, &e),
        }
    }

    /// `DELETE /api/user/urls`，请求体为短 ID 列表；删除异步生效
    pub async fn delete(
        req: HttpRequest,
        body: web::Bytes,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let shortener = &state.shortener;
        let parsed = require_json(&req)
            .and_then(|_| request_identity(&req, shortener))
            .and_then(|identity| Ok((identity, parse_json::<Vec<String>>(&body)?)));
        let (identity, short_ids) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => return error_response(&e),
        };

        if identity.fresh {
            return error_response(&ShortenerError::client_input("未知用户，无法删除"));
        }

        match shortener
            .delete_user_urls(identity.user_id, short_ids)
            .await
        {
            // 没有任何链接的用户同样视为已受理
            Ok(()) | Err(ShortenerError::NotFound(_)) => HttpResponse::Accepted().finish(),
            Err(e @ ShortenerError::ClientInput(_)) => error_response(&e),
            Err(e) => error_response_with(StatusCode::INTERNAL_SERVER_ERROR, &e),
        }
    }
}

pub fn user_urls_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/user/urls")
            .route(web::get().to(UserUrlsService::list))
            .route(web::delete().to(UserUrlsService::delete)),
    );
}
