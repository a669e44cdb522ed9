//! 令牌校验、配对码与请求 DTO 合同测试

use volteec::models::RegisterDeviceRequest;
use volteec::security::{
    generate_pair_code, mask_token, sha256_hex, ApiTokenVerifier, PAIR_CODE_ALPHABET,
};
use volteec::services::validate_api_version;

mod token_verification {
    use super::*;

    #[test]
    fn test_digest_compare_accepts_exact_match() {
        let verifier = ApiTokenVerifier::new("vt_live_0123456789abcdef");
        assert!(verifier.verify("vt_live_0123456789abcdef"));
    }

    #[test]
    fn test_digest_compare_rejects_any_length() {
        let verifier = ApiTokenVerifier::new("vt_live_0123456789abcdef");

        // 1 字节到 10000 字节的错误令牌都应得到一致的拒绝
        assert!(!verifier.verify("x"));
        assert!(!verifier.verify("vt_live_0123456789abcde"));
        assert!(!verifier.verify("vt_live_0123456789abcdef0"));
        assert!(!verifier.verify(&"x".repeat(10_000)));
    }

    #[test]
    fn test_sha256_hex_is_stable() {
        assert_eq!(sha256_hex("token"), sha256_hex("token"));
        assert_ne!(sha256_hex("token"), sha256_hex("Token"));
        assert_eq!(sha256_hex("token").len(), 64);
    }

    #[test]
    fn test_mask_token_hides_tail() {
        let masked = mask_token("vt_live_abcdefghijklmnop");
        assert!(masked.ends_with("..."));
        assert!(!masked.contains("ijklmnop"), "令牌尾部不应出现在日志中");
    }
}

mod pair_codes {
    use super::*;

    #[test]
    fn test_generated_codes_follow_contract() {
        for _ in 0..32 {
            let code = generate_pair_code().unwrap();
            assert_eq!(code.len(), 8, "配对码长度应为 8");
            assert!(
                code.bytes().all(|b| PAIR_CODE_ALPHABET.contains(&b)),
                "配对码只能使用受限字母表: {}",
                code
            );
        }
    }

    #[test]
    fn test_alphabet_has_no_ambiguous_symbols() {
        let alphabet = std::str::from_utf8(PAIR_CODE_ALPHABET).unwrap();
        assert_eq!(alphabet, "ABCDEFGHJKLMNPQRSTUVWXYZ23456789");
        for c in ['I', 'O', '0', '1'] {
            assert!(!alphabet.contains(c), "{} 不应出现在字母表中", c);
        }
    }
}

mod request_contracts {
    use super::*;

    #[test]
    fn test_api_version_gate() {
        assert!(validate_api_version(None).is_ok());
        assert!(validate_api_version(Some("")).is_ok(), "空串视为未提供");
        assert!(validate_api_version(Some("1.0")).is_ok());
        assert!(validate_api_version(Some("1.1")).is_ok());
        assert!(validate_api_version(Some("0.9")).is_err());
        assert!(validate_api_version(Some("2.0")).is_err());
    }

    #[test]
    fn test_register_request_camel_case() {
        let json = r#"{
            "apiVersion": "1.1",
            "upsId": "Rack-UPS-01",
            "upsAlias": "  机柜 UPS  ",
            "deviceToken": "abcdef0123456789",
            "environment": "production",
            "installationId": "7b0fb3f1-24e8-4b4e-9a59-6a1a3ad86271",
            "upsHidden": true
        }"#;

        let request: RegisterDeviceRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.api_version.as_deref(), Some("1.1"));
        assert_eq!(request.ups_id, "Rack-UPS-01");
        assert_eq!(request.device_token, "abcdef0123456789");
        assert_eq!(request.ups_hidden, Some(true));
        assert!(request.installation_id.is_some());
    }

    #[test]
    fn test_register_request_minimal_body() {
        let json = r#"{"upsId": "ups1", "deviceToken": "abc"}"#;
        let request: RegisterDeviceRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.ups_id, "ups1");
        assert!(request.api_version.is_none());
        assert!(request.environment.is_none(), "环境缺省由服务层补 sandbox");
        assert!(request.ups_hidden.is_none());
    }
}
