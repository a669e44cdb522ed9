//! API 访问令牌校验
//!
//! 令牌不以明文比较：两侧都取 SHA-256 摘要后做常数时间比较，
//! 比较耗时与呈现的令牌内容无关。

use ring::constant_time;
use sha2::{Digest, Sha256};

/// 计算字符串的 SHA-256 摘要（十六进制小写）
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// API 令牌校验器
///
/// 构造时只保留配置令牌的摘要，明文不驻留。
#[derive(Clone)]
pub struct ApiTokenVerifier {
    expected_digest: [u8; 32],
}

impl ApiTokenVerifier {
    pub fn new(api_token: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(api_token.as_bytes());
        Self {
            expected_digest: hasher.finalize().into(),
        }
    }

    /// 校验呈现的令牌（常数时间）
    pub fn verify(&self, presented: &str) -> bool {
        let mut hasher = Sha256::new();
        hasher.update(presented.as_bytes());
        let presented_digest: [u8; 32] = hasher.finalize().into();

        constant_time::verify_slices_are_equal(&self.expected_digest, &presented_digest).is_ok()
    }
}

/// 遮蔽令牌（用于日志）
pub fn mask_token(token: &str) -> String {
    if token.len() > 8 {
        format!("{}...", &token[..8])
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let digest = sha256_hex("test content");
        assert_eq!(digest.len(), 64, "SHA-256 摘要应为 64 个十六进制字符");
    }

    #[test]
    fn test_verify_correct_token() {
        let verifier = ApiTokenVerifier::new("my-secret-token");
        assert!(verifier.verify("my-secret-token"));
    }

    #[test]
    fn test_verify_rejects_wrong_token() {
        let verifier = ApiTokenVerifier::new("my-secret-token");
        assert!(!verifier.verify("my-secret-tokeN"));
        assert!(!verifier.verify(""));
        // 超长输入同样拒绝且不 panic
        assert!(!verifier.verify(&"x".repeat(10_000)));
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("abcdefghijklmn"), "abcdefgh...");
        assert_eq!(mask_token("short"), "***");
    }
}
