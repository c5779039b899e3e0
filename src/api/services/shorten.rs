use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::api::identity::{attach_identity, request_identity};
use crate::api::{AppState, error_response, require_json};
use crate::errors::{Result, ShortenerError};

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ShortenResponse {
    pub result: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchShortenItem {
    pub correlation_id: String,
    pub original_url: String,
}

#[derive(Debug, Serialize)]
pub struct BatchShortenResult {
    pub correlation_id: String,
    pub short_url: String,
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| ShortenerError::client_input(format!("请求体不是合法 JSON: {}", e)))
}

fn created_or_conflict(already_existed: bool) -> StatusCode {
    if already_existed {
        StatusCode::CONFLICT
    } else {
        StatusCode::CREATED
    }
}

pub struct ShortenService;

impl ShortenService {
    /// `POST /`，请求体为纯文本 URL
    pub async fn shorten_text(
        req: HttpRequest,
        body: String,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let shortener = &state.shortener;
        let identity = match request_identity(&req, shortener) {
            Ok(identity) => identity,
            Err(e) => return error_response(&e),
        };

        let shortened = match shortener.shorten(identity.user_id, &body).await {
            Ok(shortened) => shortened,
            Err(e) => return error_response(&e),
        };
        trace!(
            "POST / -> {} (existed={})",
            shortened.short_id, shortened.already_existed
        );

        let mut builder = HttpResponse::build(created_or_conflict(shortened.already_existed));
        if let Err(e) = attach_identity(&mut builder, shortener, &identity) {
            return error_response(&e);
        }
        builder
            .content_type("text/plain; charset=utf-8")
            .body(state.short_url(&req, &shortened.short_id))
    }

    /// `POST /api/shorten`
    pub async fn shorten_json(
        req: HttpRequest,
        body: web::Bytes,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let shortener = &state.shortener;
        let parsed = require_json(&req)
            .and_then(|_| request_identity(&req, shortener))
            .and_then(|identity| Ok((identity, parse_json::<ShortenRequest>(&body)?)));
        let (identity, request) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => return error_response(&e),
        };

        let shortened = match shortener.shorten(identity.user_id, &request.url).await {
            Ok(shortened) => shortened,
            Err(e) => return error_response(&e),
        };

        let mut builder = HttpResponse::build(created_or_conflict(shortened.already_existed));
        if let Err(e) = attach_identity(&mut builder, shortener, &identity) {
            return error_response(&e);
        }
        builder.json(ShortenResponse {
            result: state.short_url(&req, &shortened.short_id),
        })
    }

    /// `POST /api/shorten/batch`，响应顺序与请求一致
    pub async fn shorten_batch(
        req: HttpRequest,
        body: web::Bytes,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let shortener = &state.shortener;
        let parsed = require_json(&req)
            .and_then(|_| request_identity(&req, shortener))
            .and_then(|identity| Ok((identity, parse_json::<Vec<BatchShortenItem>>(&body)?)));
        let (identity, items) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => return error_response(&e),
        };

        let urls: Vec<String> = items.iter().map(|i| i.original_url.clone()).collect();
        let shortened = match shortener.batch_shorten(identity.user_id, &urls).await {
            Ok(shortened) => shortened,
            Err(e) => return error_response(&e),
        };
        debug!(
            "Batch shortened {} urls for user {}",
            shortened.len(),
            identity.user_id
        );

        let results: Vec<BatchShortenResult> = items
            .into_iter()
            .zip(shortened)
            .map(|(item, s)| BatchShortenResult {
                correlation_id: item.correlation_id,
                short_url: state.short_url(&req, &s.short_id),
            })
            .collect();

        let mut builder = HttpResponse::build(StatusCode::CREATED);
        if let Err(e) = attach_identity(&mut builder, shortener, &identity) {
            return error_response(&e);
        }
        builder.json(results)
    }
}

pub fn shorten_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::post().to(ShortenService::shorten_text)))
        .service(web::resource("/api/shorten").route(web::post().to(ShortenService::shorten_json)))
        .service(
            web::resource("/api/shorten/batch")
                .route(web::post().to(ShortenService::shorten_batch)),
        );
}
