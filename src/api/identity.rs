//! 身份 Cookie 读写

use actix_web::cookie::Cookie;
use actix_web::{HttpRequest, HttpResponseBuilder};

use super::constants::USER_ID_COOKIE_NAME;
use crate::errors::Result;
use crate::identity::Identity;
use crate::services::UrlShortener;

/// 读取请求中的身份令牌；没有 Cookie 或校验不通过时得到新身份
///
/// 结构性损坏（base64 错误、长度不足）返回 `ClientInput`。
pub fn request_identity(req: &HttpRequest, shortener: &UrlShortener) -> Result<Identity> {
    let cookie = req.cookie(USER_ID_COOKIE_NAME);
    shortener.decode_identity(cookie.as_ref().map(|c| c.value()))
}

/// 新身份才写 Cookie
pub fn attach_identity(
    builder: &mut HttpResponseBuilder,
    shortener: &UrlShortener,
    identity: &Identity,
) -> Result<()> {
    if identity.fresh {
        let token = shortener.encode_identity(identity.user_id)?;
        builder.cookie(
            Cookie::build(USER_ID_COOKIE_NAME, token)
                .path("/")
                .http_only(true)
                .finish(),
        );
    }
    Ok(())
}
