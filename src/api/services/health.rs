use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::Serialize;
use tracing::{debug, trace};

use crate::api::constants::REAL_IP_HEADER;
use crate::api::{AppState, error_response_with};

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub urls: u64,
    pub users: u64,
}

pub struct HealthService;

impl HealthService {
    /// `GET /ping`
    pub async fn ping(state: web::Data<AppState>) -> impl Responder {
        match state.shortener.ping().await {
            Ok(()) => {
                trace!("Ping ok ({})", state.shortener.backend_name());
                HttpResponse::Ok().finish()
            }
            Err(e) => error_response_with(StatusCode::INTERNAL_SERVER_ERROR, &e),
        }
    }

    /// `GET /api/internal/stats`，只对可信子网内的 `X-Real-IP` 开放
    pub async fn stats(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
        let real_ip = req
            .headers()
            .get(REAL_IP_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let trusted = state
            .trusted_subnet()
            .is_some_and(|subnet| subnet.contains_str(real_ip));
        if !trusted {
            debug!("Stats request rejected for '{}'", real_ip);
            return HttpResponse::Forbidden().finish();
        }

        match state.shortener.stats().await {
            Ok(stats) => HttpResponse::Ok().json(StatsResponse {
                urls: stats.total_urls,
                users: stats.total_users,
            }),
            Err(e) => error_response_with(StatusCode::INTERNAL_SERVER_ERROR, &e),
        }
    }
}

pub fn health_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ping").route(web::get().to(HealthService::ping)))
        .service(
            web::resource("/api/internal/stats").route(web::get().to(HealthService::stats)),
        );
}
