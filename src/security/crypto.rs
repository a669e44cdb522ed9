//! 设备令牌加解密
//!
//! AES-256-GCM，密钥来自环境变量（base64，32 字节）。
//! 落库格式：base64( nonce[12] || ciphertext || tag[16] )。

use crate::errors::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::aead::{self, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};

/// 设备令牌加密器
pub struct DeviceTokenCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl DeviceTokenCipher {
    /// 从 Base64 编码的密钥创建加密器
    pub fn new(key_base64: &str) -> Result<Self, AppError> {
        let key_bytes = BASE64
            .decode(key_base64.trim())
            .map_err(|e| AppError::ConfigError(format!("DEVICE_TOKEN_KEY 格式无效: {}", e)))?;

        if key_bytes.len() != 32 {
            return Err(AppError::ConfigError(
                "DEVICE_TOKEN_KEY 必须是 32 字节（256 位）".to_string(),
            ));
        }

        let unbound_key = UnboundKey::new(&AES_256_GCM, &key_bytes)
            .map_err(|_| AppError::ConfigError("无法创建加密密钥".to_string()))?;

        Ok(Self {
            key: LessSafeKey::new(unbound_key),
            rng: SystemRandom::new(),
        })
    }

    /// 加密设备令牌，返回 Base64 密文
    pub fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        let mut nonce_bytes = [0u8; 12];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AppError::InternalError("随机数生成失败".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| AppError::InternalError("加密失败".to_string()))?;

        // nonce 置于密文之前
        let mut result = nonce_bytes.to_vec();
        result.extend(in_out);
        Ok(BASE64.encode(result))
    }

    /// 解密设备令牌
    ///
    /// 任何解密失败（格式不对、长度不足、标签校验不过、非 UTF-8）都返回
    /// `None`——调用方按"未找到"处理，不向外报错。
    pub fn decrypt(&self, ciphertext_base64: &str) -> Option<String> {
        let ciphertext = BASE64.decode(ciphertext_base64).ok()?;
        if ciphertext.len() < 12 + 16 {
            return None;
        }

        let (nonce_bytes, encrypted) = ciphertext.split_at(12);
        let nonce = Nonce::assume_unique_for_key(nonce_bytes.try_into().ok()?);

        let mut in_out = encrypted.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
            .ok()?;

        String::from_utf8(plaintext.to_vec()).ok()
    }
}

/// 生成安全随机字节
pub fn generate_random_bytes(len: usize) -> Result<Vec<u8>, AppError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|_| AppError::InternalError("随机数生成失败".to_string()))?;
    Ok(bytes)
}

/// 生成 32 字节加密密钥（Base64 编码）
pub fn generate_encryption_key() -> Result<String, AppError> {
    let bytes = generate_random_bytes(32)?;
    Ok(BASE64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_encryption_key().unwrap();
        let cipher = DeviceTokenCipher::new(&key).unwrap();

        let token = "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2";
        let encrypted = cipher.encrypt(token).unwrap();
        assert_ne!(encrypted, token);

        assert_eq!(cipher.decrypt(&encrypted).as_deref(), Some(token));
    }

    #[test]
    fn test_decrypt_garbage_returns_none() {
        let key = generate_encryption_key().unwrap();
        let cipher = DeviceTokenCipher::new(&key).unwrap();

        // 27 字节的随机 blob：长度不足 nonce+tag，按未找到处理
        let garbage = BASE64.encode([0x42u8; 27]);
        assert_eq!(cipher.decrypt(&garbage), None);

        // 非 base64 输入
        assert_eq!(cipher.decrypt("not-base64!!!"), None);
    }

    #[test]
    fn test_decrypt_with_wrong_key_returns_none() {
        let cipher_a = DeviceTokenCipher::new(&generate_encryption_key().unwrap()).unwrap();
        let cipher_b = DeviceTokenCipher::new(&generate_encryption_key().unwrap()).unwrap();

        let encrypted = cipher_a.encrypt("secret-token").unwrap();
        assert_eq!(cipher_b.decrypt(&encrypted), None);
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(DeviceTokenCipher::new("short").is_err());
        assert!(DeviceTokenCipher::new(&BASE64.encode([0u8; 16])).is_err());
    }
}
