//! 匿名身份令牌
//!
//! 令牌格式（base64url，无填充）：`tag(32) || nonce(12) || ciphertext`
//! - ciphertext：AES-256-GCM 加密的 8 字节大端 user id
//! - tag：HMAC-SHA256(nonce || ciphertext)，密钥由同一个 secret 派生
//!
//! tag 不匹配（被篡改或来自其它进程的令牌）不是错误，而是当作新用户处理。

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use rand::RngExt;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, trace};

use crate::errors::{Result, ShortenerError};

type HmacSha256 = Hmac<Sha256>;

const TAG_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const SECRET_LEN: usize = 32;
const HMAC_KEY_CONTEXT: &[u8] = b"shortener-hmac";

/// 解码后的身份
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: u64,
    /// true 表示没有可用令牌，本次生成了新 id
    pub fresh: bool,
}

impl Identity {
    fn fresh() -> Self {
        Self {
            user_id: rand::random::<u64>(),
            fresh: true,
        }
    }
}

/// 令牌完整性校验结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenVerdict {
    Valid(u64),
    Invalid,
}

/// 进程级令牌编解码器，构造后只读
#[derive(Clone)]
pub struct IdentityCodec {
    cipher: Aes256Gcm,
    mac_key: [u8; 32],
}

impl IdentityCodec {
    /// 使用随机 secret；进程重启后旧令牌全部失效
    pub fn generate() -> Self {
        let mut secret = [0u8; SECRET_LEN];
        rand::rng().fill(&mut secret);
        Self::from_secret(&secret)
    }

    pub fn from_secret(secret: &[u8; SECRET_LEN]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(HMAC_KEY_CONTEXT);
        hasher.update(secret);

        Self {
            cipher: Aes256Gcm::new(secret.into()),
            mac_key: hasher.finalize().into(),
        }
    }

    fn tag(&self, sealed: &[u8]) -> Result<[u8; TAG_LEN]> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.mac_key)
            .map_err(|e| ShortenerError::crypto(format!("HMAC 初始化失败: {}", e)))?;
        mac.update(sealed);
        Ok(mac.finalize().into_bytes().into())
    }

    pub fn encode(&self, user_id: u64) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), user_id.to_be_bytes().as_slice())
            .map_err(|e| ShortenerError::crypto(format!("令牌加密失败: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        let mut blob = Vec::with_capacity(TAG_LEN + sealed.len());
        blob.extend_from_slice(&self.tag(&sealed)?);
        blob.extend_from_slice(&sealed);

        Ok(URL_SAFE_NO_PAD.encode(blob))
    }

    /// 校验并解密令牌
    ///
    /// 结构错误（base64 非法、长度不足）返回 `ClientInput`；tag 不匹配返回
    /// `TokenVerdict::Invalid`；tag 匹配但解密失败返回 `Crypto`。
    pub fn verify(&self, token: &str) -> Result<TokenVerdict> {
        let blob = URL_SAFE_NO_PAD.decode(token.trim())?;
        if blob.len() < TAG_LEN + NONCE_LEN + 1 {
            return Err(ShortenerError::client_input(format!(
                "身份令牌过短: {} 字节",
                blob.len()
            )));
        }

        let (tag, sealed) = blob.split_at(TAG_LEN);
        let expected = self.tag(sealed)?;
        if !bool::from(expected.as_slice().ct_eq(tag)) {
            debug!("Identity token failed integrity check");
            return Ok(TokenVerdict::Invalid);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| ShortenerError::crypto(format!("令牌解密失败: {}", e)))?;

        let id_bytes: [u8; 8] = plaintext.as_slice().try_into().map_err(|_| {
            ShortenerError::crypto(format!("令牌明文长度错误: {} 字节", plaintext.len()))
        })?;

        Ok(TokenVerdict::Valid(u64::from_be_bytes(id_bytes)))
    }

    /// 没有令牌或令牌未通过校验时生成新 id
    pub fn decode(&self, token: Option<&str>) -> Result<Identity> {
        let Some(token) = token else {
            return Ok(Identity::fresh());
        };

        match self.verify(token)? {
            TokenVerdict::Valid(user_id) => {
                trace!("Identity token accepted for user {}", user_id);
                Ok(Identity {
                    user_id,
                    fresh: false,
                })
            }
            TokenVerdict::Invalid => Ok(Identity::fresh()),
        }
    }
}
