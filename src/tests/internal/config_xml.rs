//! 配置 XML：默认值、缺省元素、非法值。

use crate::transfer::{
    DEFAULT_BYTES_PER_BLOCK, DEFAULT_RETRY_COUNT, DEFAULT_SESSION_NUMBER, HttpConfig,
    TaskBuilder, TransferError,
};

#[test]
fn default_config_serializes_known_elements() {
    let xml = HttpConfig::default().to_xml().expect("编码");
    assert!(xml.starts_with("<HttpConfig>"));
    assert!(xml.contains(&format!("<SessionNumber>{DEFAULT_SESSION_NUMBER}</SessionNumber>")));
    assert!(xml.contains(&format!("<BytesPerBlock>{DEFAULT_BYTES_PER_BLOCK}</BytesPerBlock>")));
    assert!(xml.contains(&format!("<RetryCount>{DEFAULT_RETRY_COUNT}</RetryCount>")));
    // 未设置的请求头不输出
    assert!(!xml.contains("Referer"));
}

#[test]
fn missing_elements_take_defaults() {
    let config =
        HttpConfig::from_xml("<HttpConfig><SessionNumber>8</SessionNumber></HttpConfig>")
            .expect("解析");
    assert_eq!(config.session_number, 8);
    assert_eq!(config.bytes_per_block, DEFAULT_BYTES_PER_BLOCK);
    assert_eq!(config.referer, None);
}

#[test]
fn headers_survive_xml() {
    let config = HttpConfig {
        referer: Some("http://mirror.test/".to_string()),
        user_agent: Some("segfetch-test".to_string()),
        ..HttpConfig::default()
    };
    let parsed = HttpConfig::from_xml(&config.to_xml().expect("编码")).expect("解析");
    assert_eq!(parsed, config);
}

#[test]
fn zero_values_are_invalid() {
    for xml in [
        "<HttpConfig><SessionNumber>0</SessionNumber></HttpConfig>",
        "<HttpConfig><MinSessionBlocks>0</MinSessionBlocks></HttpConfig>",
        "<HttpConfig><BytesPerBlock>0</BytesPerBlock></HttpConfig>",
    ] {
        let err = HttpConfig::from_xml(xml).unwrap_err();
        assert!(matches!(err, TransferError::InvalidConfig(_)), "{xml}: {err}");
    }
}

#[test]
fn malformed_xml_is_invalid() {
    let err = HttpConfig::from_xml("<HttpConfig><SessionNumber>many</SessionNumber></HttpConfig>")
        .unwrap_err();
    assert!(matches!(err, TransferError::InvalidConfig(_)));
}

#[test]
fn builder_accepts_options_text() {
    let builder = TaskBuilder::new("http://mirror.test/a.bin")
        .options("<HttpConfig><SessionNumber>3</SessionNumber><BytesPerBlock>1024</BytesPerBlock></HttpConfig>")
        .expect("解析配置");
    assert_eq!(builder.config.session_number, 3);
    assert_eq!(builder.config.bytes_per_block, 1024);
}
