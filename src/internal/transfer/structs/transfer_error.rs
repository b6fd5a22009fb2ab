//! 传输相关错误类型。

use thiserror::Error;

/// 错误的粗粒度分类，调用方据此区分致命与可重试。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransportSetupFailed,
    TransportRequestFailed,
    FileIoFailed,
    InvariantViolation,
    ResumeDataCorrupt,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("建立传输失败: {0}")]
    TransportSetup(String),

    #[error("请求失败: {0}")]
    TransportRequest(String),

    #[error("连续 {0} 个会话失败，放弃任务")]
    RetriesExhausted(usize),

    #[error("服务器不支持 Range 请求")]
    RangeNotSupported,

    #[error("文件读写失败: {0}")]
    FileIo(String),

    #[error("内部不变量被破坏: {0}")]
    InvariantViolation(String),

    #[error("续传数据损坏: {0}")]
    ResumeDataCorrupt(String),

    #[error("续传数据与远程文件不一致: {0}")]
    ResumeMismatch(String),

    #[error("配置无效: {0}")]
    InvalidConfig(String),

    #[error("不支持的地址: {0}")]
    UnsupportedUri(String),

    #[error("任务不存在: {0}")]
    TaskNotFound(u32),

    #[error("任务状态不允许该操作: {0}")]
    InvalidTaskState(String),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransportSetup(_) | Self::UnsupportedUri(_) | Self::InvalidConfig(_) => {
                ErrorKind::TransportSetupFailed
            }
            Self::TransportRequest(_) | Self::RetriesExhausted(_) | Self::RangeNotSupported => {
                ErrorKind::TransportRequestFailed
            }
            Self::FileIo(_) => ErrorKind::FileIoFailed,
            Self::InvariantViolation(_) | Self::TaskNotFound(_) | Self::InvalidTaskState(_) => {
                ErrorKind::InvariantViolation
            }
            Self::ResumeDataCorrupt(_) | Self::ResumeMismatch(_) => ErrorKind::ResumeDataCorrupt,
        }
    }

    /// 把文件存储的 io 错误包装成 `FileIo`，附带操作名。
    pub(crate) fn file_io(op: &str, err: std::io::Error) -> Self {
        Self::FileIo(format!("{op}: {err}"))
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::TransportSetup(err.to_string())
        } else {
            Self::TransportRequest(err.to_string())
        }
    }
}
