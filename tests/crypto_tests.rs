//! 设备令牌加解密测试

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use volteec::security::{generate_encryption_key, DeviceTokenCipher};

#[test]
fn test_roundtrip_any_utf8() {
    let cipher = DeviceTokenCipher::new(&generate_encryption_key().unwrap()).unwrap();

    let samples = [
        "plain-ascii-token",
        "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2",
        "含中文的令牌内容",
        "emoji 🔋⚡",
        "",
    ];

    for sample in samples {
        let encrypted = cipher.encrypt(sample).unwrap();
        assert_eq!(
            cipher.decrypt(&encrypted).as_deref(),
            Some(sample),
            "往返后应还原: {:?}",
            sample
        );
    }
}

#[test]
fn test_ciphertext_layout() {
    let cipher = DeviceTokenCipher::new(&generate_encryption_key().unwrap()).unwrap();

    let encrypted = cipher.encrypt("token").unwrap();
    let raw = BASE64.decode(&encrypted).unwrap();
    // nonce(12) + 明文长度 + tag(16)
    assert_eq!(raw.len(), 12 + 5 + 16);
}

#[test]
fn test_nonce_makes_ciphertexts_differ() {
    let cipher = DeviceTokenCipher::new(&generate_encryption_key().unwrap()).unwrap();

    let a = cipher.encrypt("same-token").unwrap();
    let b = cipher.encrypt("same-token").unwrap();
    assert_ne!(a, b, "随机 nonce 下同一明文的两次密文应不同");
}

#[test]
fn test_arbitrary_blob_decrypts_to_none() {
    let cipher = DeviceTokenCipher::new(&generate_encryption_key().unwrap()).unwrap();

    // 27 字节随机 blob：不足 nonce+tag 的最小长度
    let blob = BASE64.encode([0x5au8; 27]);
    assert_eq!(cipher.decrypt(&blob), None, "垃圾输入应按未找到处理而非报错");

    // 刚好 28 字节但标签校验必然失败
    let blob = BASE64.encode([0x5au8; 28]);
    assert_eq!(cipher.decrypt(&blob), None);
}
