use serde::{Deserialize, Serialize};

use super::transfer_error::TransferError;

/// 默认目标会话数
pub const DEFAULT_SESSION_NUMBER: usize = 5;

/// 默认最小可拆分块数
pub const DEFAULT_MIN_SESSION_BLOCKS: u64 = 1;

/// 默认块大小（字节）
pub const DEFAULT_BYTES_PER_BLOCK: u64 = 512;

/// 默认连续失败上限，0 表示不限制
pub const DEFAULT_RETRY_COUNT: usize = 5;

/// 任务配置；以 XML 文本形式在协议层与调用方之间传递。
///
/// ```xml
/// <HttpConfig>
///   <SessionNumber>5</SessionNumber>
///   <MinSessionBlocks>1</MinSessionBlocks>
///   <BytesPerBlock>512</BytesPerBlock>
///   <RetryCount>5</RetryCount>
/// </HttpConfig>
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "HttpConfig", default)]
pub struct HttpConfig {
    /// 目标并发会话数 N
    #[serde(rename = "SessionNumber")]
    pub session_number: usize,
    /// 每个会话至少保留的块数 M，拆分时两半都不得少于它
    #[serde(rename = "MinSessionBlocks")]
    pub min_session_blocks: u64,
    /// 位图每一位对应的字节数
    #[serde(rename = "BytesPerBlock")]
    pub bytes_per_block: u64,
    #[serde(rename = "Referer", skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(rename = "UserAgent", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// 连续多少个会话失败（期间没有写入任何字节）后放弃任务
    #[serde(rename = "RetryCount")]
    pub retry_count: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            session_number: DEFAULT_SESSION_NUMBER,
            min_session_blocks: DEFAULT_MIN_SESSION_BLOCKS,
            bytes_per_block: DEFAULT_BYTES_PER_BLOCK,
            referer: None,
            user_agent: None,
            retry_count: DEFAULT_RETRY_COUNT,
        }
    }
}

impl HttpConfig {
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.session_number == 0 {
            return Err(TransferError::InvalidConfig(
                "会话数必须大于 0".to_string(),
            ));
        }
        if self.min_session_blocks == 0 {
            return Err(TransferError::InvalidConfig(
                "最小会话块数必须大于 0".to_string(),
            ));
        }
        if self.bytes_per_block == 0 {
            return Err(TransferError::InvalidConfig(
                "块大小必须大于 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_xml(&self) -> Result<String, TransferError> {
        quick_xml::se::to_string(self)
            .map_err(|e| TransferError::InvalidConfig(e.to_string()))
    }

    /// 解析配置文本；缺失的元素取默认值，空的 Referer/UserAgent 视为未设置。
    pub fn from_xml(text: &str) -> Result<Self, TransferError> {
        let mut config: Self = quick_xml::de::from_str(text)
            .map_err(|e| TransferError::InvalidConfig(e.to_string()))?;
        config.referer = config.referer.filter(|s| !s.is_empty());
        config.user_agent = config.user_agent.filter(|s| !s.is_empty());
        config.validate()?;
        Ok(config)
    }
}
