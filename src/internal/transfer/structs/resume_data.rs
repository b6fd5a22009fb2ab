//! 续传数据：配置 + 位图，唯一需要持久化的任务状态。
//!
//! 会话从不持久化，下次启动时总是根据位图重新拆分。

use serde::{Deserialize, Serialize};

use super::http_config::HttpConfig;
use super::progress_bitmap::ProgressBitmap;
use super::transfer_error::TransferError;

/// 对应续传 XML 顶层的 `<HttpTask>` 节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "HttpTask")]
pub struct ResumeData {
    #[serde(rename = "SessionNumber")]
    pub session_number: usize,
    #[serde(rename = "MinSessionBlocks")]
    pub min_session_blocks: u64,
    #[serde(rename = "BytesPerBlock")]
    pub bytes_per_block: u64,
    /// 总字节数；0 表示保存时长度尚未确定
    #[serde(rename = "TotalSize")]
    pub total_size: u64,
    /// 按位下标排列的 `'0'/'1'` 字符
    #[serde(rename = "BitMap", default)]
    pub bitmap: String,
}

impl ResumeData {
    /// 由配置与位图生成；位图缺失（长度未知）时只记录配置。
    pub fn new(config: &HttpConfig, bitmap: Option<&ProgressBitmap>) -> Self {
        Self {
            session_number: config.session_number,
            min_session_blocks: config.min_session_blocks,
            bytes_per_block: bitmap
                .map(|m| m.block_size())
                .unwrap_or(config.bytes_per_block),
            total_size: bitmap.map(|m| m.length()).unwrap_or(0),
            bitmap: bitmap.map(|m| m.to_bit_string()).unwrap_or_default(),
        }
    }

    pub fn to_xml(&self) -> Result<String, TransferError> {
        quick_xml::se::to_string(self)
            .map_err(|e| TransferError::ResumeDataCorrupt(e.to_string()))
    }

    pub fn from_xml(text: &str) -> Result<Self, TransferError> {
        let data: Self = quick_xml::de::from_str(text)
            .map_err(|e| TransferError::ResumeDataCorrupt(e.to_string()))?;
        // 提前校验，避免等到任务启动才发现损坏
        data.bitmap()?;
        Ok(data)
    }

    /// 还原位图；`TotalSize` 为 0 时没有位图可还原。
    pub fn bitmap(&self) -> Result<Option<ProgressBitmap>, TransferError> {
        if self.total_size == 0 {
            if !self.bitmap.is_empty() {
                return Err(TransferError::ResumeDataCorrupt(
                    "总大小为 0 但位图非空".to_string(),
                ));
            }
            return Ok(None);
        }
        ProgressBitmap::from_bit_string(self.total_size, self.bytes_per_block, &self.bitmap)
            .map(Some)
    }

    /// 把续传数据里的拆分参数覆盖到配置上，其余字段保持不变。
    pub fn apply_to(&self, config: &mut HttpConfig) {
        config.session_number = self.session_number;
        config.min_session_blocks = self.min_session_blocks;
        config.bytes_per_block = self.bytes_per_block;
    }
}
