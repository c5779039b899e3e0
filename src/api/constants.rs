//! API 模块常量定义

/// 身份令牌 Cookie 名称
pub const USER_ID_COOKIE_NAME: &str = "gusid";

/// 内部统计接口读取的客户端 IP 头
pub const REAL_IP_HEADER: &str = "X-Real-IP";
