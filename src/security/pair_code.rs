//! Relay 配对码生成
//!
//! 8 位人读码，字母表排除易混淆字符 I、O、0、1。

use crate::errors::AppError;
use crate::security::generate_random_bytes;

/// 配对码字母表（32 个字符）
pub const PAIR_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// 配对码长度
pub const PAIR_CODE_LENGTH: usize = 8;

/// 生成新的配对码
pub fn generate_pair_code() -> Result<String, AppError> {
    let bytes = generate_random_bytes(PAIR_CODE_LENGTH)?;
    // 32 整除 256，取模不引入偏差
    let code: String = bytes
        .iter()
        .map(|b| PAIR_CODE_ALPHABET[(*b as usize) % PAIR_CODE_ALPHABET.len()] as char)
        .collect();
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_code_length() {
        let code = generate_pair_code().unwrap();
        assert_eq!(code.len(), PAIR_CODE_LENGTH);
    }

    #[test]
    fn test_pair_code_alphabet() {
        for _ in 0..64 {
            let code = generate_pair_code().unwrap();
            for c in code.bytes() {
                assert!(
                    PAIR_CODE_ALPHABET.contains(&c),
                    "配对码含字母表之外的字符: {}",
                    c as char
                );
            }
        }
    }

    #[test]
    fn test_pair_code_excludes_ambiguous_chars() {
        assert!(!PAIR_CODE_ALPHABET.contains(&b'I'));
        assert!(!PAIR_CODE_ALPHABET.contains(&b'O'));
        assert!(!PAIR_CODE_ALPHABET.contains(&b'0'));
        assert!(!PAIR_CODE_ALPHABET.contains(&b'1'));
        assert_eq!(PAIR_CODE_ALPHABET.len(), 32);
    }

    #[test]
    fn test_pair_codes_differ() {
        let a = generate_pair_code().unwrap();
        let b = generate_pair_code().unwrap();
        // 32^8 空间内撞码概率可忽略
        assert_ne!(a, b);
    }
}
