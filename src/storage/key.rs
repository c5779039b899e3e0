//! 短 ID 的派生与外部编码
//!
//! key = FNV-1 64 位指纹（先乘后异或），外部形式为小写十六进制文本再做
//! base64url（无填充）编码。已发出的短链接依赖这两步编码，不可更改。

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::errors::{Result, ShortenerError};

const FNV64_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV64_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 从 URL 文本派生 64 位 key
///
/// 不同 URL 可能碰撞；碰撞时后写入的 URL 被视为“已存在”。
#[inline]
pub fn derive_key(url: &str) -> u64 {
    url.as_bytes().iter().fold(FNV64_OFFSET_BASIS, |hash, byte| {
        hash.wrapping_mul(FNV64_PRIME) ^ u64::from(*byte)
    })
}

/// key → 外部短 ID
pub fn encode_key(key: u64) -> String {
    URL_SAFE_NO_PAD.encode(format!("{:x}", key))
}

/// 外部短 ID → key
pub fn decode_key(encoded: &str) -> Result<u64> {
    let raw = URL_SAFE_NO_PAD.decode(encoded)?;
    let hex = std::str::from_utf8(&raw)
        .map_err(|_| ShortenerError::client_input(format!("短 ID 不是合法文本: {}", encoded)))?;

    // from_str_radix 接受前导 '+'，这里只允许纯十六进制
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ShortenerError::client_input(format!(
            "短 ID 不是十六进制: {}",
            encoded
        )));
    }

    u64::from_str_radix(hex, 16)
        .map_err(|e| ShortenerError::client_input(format!("短 ID 超出范围 {}: {}", encoded, e)))
}
