//! HTTP API 集成测试
//!
//! 使用内存后端，覆盖所有路由的状态码与身份 Cookie 行为。

use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::{StatusCode, header};
use actix_web::test::{self, TestRequest};
use actix_web::{App, web};
use serde_json::{Value, json};

use shortener::api::constants::USER_ID_COOKIE_NAME;
use shortener::api::{AppState, configure};
use shortener::services::{ShortenerOptions, UrlShortener};
use shortener::storage::InMemoryStorage;
use shortener::utils::TrustedSubnet;

const BASE_URL: &str = "http://sho.rt";
const YA_RU_ID: &str = "ZjRhMjc3OGQ1N2UyMWQzMw";

fn app_state(base_url: Option<&str>, subnet: Option<&str>) -> AppState {
    let shortener = Arc::new(UrlShortener::new(
        Arc::new(InMemoryStorage::new()),
        ShortenerOptions::default(),
    ));
    AppState::new(
        shortener,
        base_url.map(str::to_string),
        subnet.map(|s| s.parse::<TrustedSubnet>().unwrap()),
    )
}

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(configure),
        )
        .await
    };
}

fn identity_cookie(resp: &ServiceResponse) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|c| c.name() == USER_ID_COOKIE_NAME)
        .map(|c| c.into_owned())
}

#[actix_rt::test]
async fn test_shorten_text() {
    let app = init_app!(app_state(Some(BASE_URL), None));

    let req = TestRequest::post()
        .uri("/")
        .set_payload("https://ya.ru")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let cookie = identity_cookie(&resp).expect("新用户应下发 Cookie");
    assert_eq!(cookie.path(), Some("/"));
    let body = test::read_body(resp).await;
    assert_eq!(body, format!("{}/{}", BASE_URL, YA_RU_ID));

    // 同一个 URL 再次提交：409，已知用户不再下发 Cookie
    let req = TestRequest::post()
        .uri("/")
        .cookie(cookie)
        .set_payload("https://ya.ru")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert!(identity_cookie(&resp).is_none());
    let body = test::read_body(resp).await;
    assert_eq!(body, format!("{}/{}", BASE_URL, YA_RU_ID));
}

#[actix_rt::test]
async fn test_short_url_uses_request_host_without_base_url() {
    let app = init_app!(app_state(None, None));

    let req = TestRequest::post()
        .uri("/")
        .insert_header((header::HOST, "links.example:9000"))
        .set_payload("https://ya.ru")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = test::read_body(resp).await;
    assert_eq!(body, format!("http://links.example:9000/{}", YA_RU_ID));
}

#[actix_rt::test]
async fn test_shorten_text_rejects_bad_input() {
    let app = init_app!(app_state(Some(BASE_URL), None));

    let req = TestRequest::post()
        .uri("/")
        .set_payload("definitely not a url")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let req = TestRequest::post()
        .uri("/")
        .cookie(Cookie::new(USER_ID_COOKIE_NAME, "***"))
        .set_payload("https://ya.ru")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[actix_rt::test]
async fn test_shorten_json() {
    let app = init_app!(app_state(Some(BASE_URL), None));

    let req = TestRequest::post()
        .uri("/api/shorten")
        .set_json(json!({ "url": "https://ya.ru" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(identity_cookie(&resp).is_some());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["result"], format!("{}/{}", BASE_URL, YA_RU_ID));

    let req = TestRequest::post()
        .uri("/api/shorten")
        .set_json(json!({ "url": "https://ya.ru" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::CONFLICT
    );
}

#[actix_rt::test]
async fn test_json_endpoints_validate_requests() {
    let app = init_app!(app_state(Some(BASE_URL), None));

    // Content-Type 不是 application/json
    let req = TestRequest::post()
        .uri("/api/shorten")
        .insert_header((header::CONTENT_TYPE, "text/plain"))
        .set_payload(r#"{"url":"https://ya.ru"}"#)
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    // JSON 语法错误
    let req = TestRequest::post()
        .uri("/api/shorten")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{not json")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    // URL 非法
    let req = TestRequest::post()
        .uri("/api/shorten")
        .set_json(json!({ "url": "ya.ru" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let req = TestRequest::post()
        .uri("/api/shorten/batch")
        .set_json(json!([{ "correlation_id": "1", "original_url": "nope" }]))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[actix_rt::test]
async fn test_shorten_batch_keeps_correlation_ids() {
    let app = init_app!(app_state(Some(BASE_URL), None));

    let req = TestRequest::post()
        .uri("/api/shorten/batch")
        .set_json(json!([
            { "correlation_id": "first", "original_url": "https://ya.ru" },
            { "correlation_id": "second", "original_url": "https://example.com/x" },
        ]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["correlation_id"], "first");
    assert_eq!(
        items[0]["short_url"],
        format!("{}/{}", BASE_URL, YA_RU_ID)
    );
    assert_eq!(items[1]["correlation_id"], "second");
}

#[actix_rt::test]
async fn test_redirect() {
    let app = init_app!(app_state(Some(BASE_URL), None));

    let req = TestRequest::post()
        .uri("/")
        .set_payload("https://ya.ru/some/path?q=1")
        .to_request();
    let body = test::read_body(test::call_service(&app, req).await).await;
    let short_url = String::from_utf8(body.to_vec()).unwrap();
    let id = short_url.rsplit('/').next().unwrap().to_string();

    let req = TestRequest::get().uri(&format!("/{}", id)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "https://ya.ru/some/path?q=1"
    );

    // 合法但不存在的 ID 与非法 ID 都是 404
    for uri in [format!("/{}", YA_RU_ID), "/not-hex".to_string()] {
        let req = TestRequest::get().uri(&uri).to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND,
            "{}",
            uri
        );
    }
}

#[actix_rt::test]
async fn test_user_urls_lifecycle() {
    let app = init_app!(app_state(Some(BASE_URL), None));

    // 没有身份：204，并下发新身份
    let req = TestRequest::get().uri("/api/user/urls").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let cookie = identity_cookie(&resp).unwrap();

    // 有身份但还没有链接：同样 204
    let req = TestRequest::get()
        .uri("/api/user/urls")
        .cookie(cookie.clone())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );

    let req = TestRequest::post()
        .uri("/api/shorten/batch")
        .cookie(cookie.clone())
        .set_json(json!([
            { "correlation_id": "a", "original_url": "https://ya.ru" },
            { "correlation_id": "b", "original_url": "https://example.com/b" },
        ]))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::CREATED
    );

    let req = TestRequest::get()
        .uri("/api/user/urls")
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["original_url"], "https://ya.ru");
    assert_eq!(items[0]["short_url"], format!("{}/{}", BASE_URL, YA_RU_ID));

    let req = TestRequest::delete()
        .uri("/api/user/urls")
        .cookie(cookie.clone())
        .set_json(json!([YA_RU_ID]))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::ACCEPTED
    );

    let req = TestRequest::get()
        .uri(&format!("/{}", YA_RU_ID))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::GONE);

    let req = TestRequest::get()
        .uri("/api/user/urls")
        .cookie(cookie)
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[actix_rt::test]
async fn test_delete_requires_known_identity() {
    let app = init_app!(app_state(Some(BASE_URL), None));

    let req = TestRequest::delete()
        .uri("/api/user/urls")
        .set_json(json!([YA_RU_ID]))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[actix_rt::test]
async fn test_delete_does_not_touch_other_users_links() {
    let app = init_app!(app_state(Some(BASE_URL), None));

    let req = TestRequest::post()
        .uri("/")
        .set_payload("https://ya.ru")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::CREATED
    );

    let req = TestRequest::post()
        .uri("/")
        .set_payload("https://mallory.example")
        .to_request();
    let resp = test::call_service(&app, req).await;
    let mallory = identity_cookie(&resp).unwrap();

    let req = TestRequest::delete()
        .uri("/api/user/urls")
        .cookie(mallory)
        .set_json(json!([YA_RU_ID]))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::ACCEPTED
    );

    let req = TestRequest::get()
        .uri(&format!("/{}", YA_RU_ID))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::TEMPORARY_REDIRECT
    );
}

#[actix_rt::test]
async fn test_ping() {
    let app = init_app!(app_state(None, None));

    let req = TestRequest::get().uri("/ping").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_internal_stats_requires_trusted_subnet() {
    let app = init_app!(app_state(Some(BASE_URL), Some("10.0.0.0/8")));

    let req = TestRequest::post()
        .uri("/")
        .set_payload("https://ya.ru")
        .to_request();
    test::call_service(&app, req).await;

    let req = TestRequest::get().uri("/api/internal/stats").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = TestRequest::get()
        .uri("/api/internal/stats")
        .insert_header(("X-Real-IP", "192.168.0.1"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = TestRequest::get()
        .uri("/api/internal/stats")
        .insert_header(("X-Real-IP", "10.1.2.3"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "urls": 1, "users": 1 }));
}

#[actix_rt::test]
async fn test_internal_stats_disabled_without_subnet() {
    let app = init_app!(app_state(None, None));

    let req = TestRequest::get()
        .uri("/api/internal/stats")
        .insert_header(("X-Real-IP", "127.0.0.1"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );
}
