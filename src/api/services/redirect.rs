use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Responder, web};
use tracing::{debug, trace};

use crate::api::{AppState, error_response, error_response_with};
use crate::errors::ShortenerError;

pub struct RedirectService;

impl RedirectService {
    /// `GET /{id}`
    pub async fn handle_redirect(
        path: web::Path<String>,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let short_id = path.into_inner();

        match state.shortener.resolve(&short_id).await {
            Ok(url) => {
                trace!("Redirecting {} -> {}", short_id, url);
                HttpResponse::TemporaryRedirect()
                    .insert_header(("Location", url))
                    .finish()
            }
            Err(ShortenerError::Deleted(_)) => {
                debug!("Short link {} has been deleted", short_id);
                HttpResponse::Gone().finish()
            }
            // 非法短 ID 与不存在一样返回 404
            Err(e @ (ShortenerError::NotFound(_) | ShortenerError::ClientInput(_))) => {
                error_response_with(StatusCode::NOT_FOUND, &e)
            }
            Err(e) => error_response(&e),
        }
    }
}

pub fn redirect_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/{id}").route(web::get().to(RedirectService::handle_redirect)));
}
