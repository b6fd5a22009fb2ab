//! 传输层回报给引擎的事件。

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};

/// 传输句柄：由传输层分配，引擎对每个句柄最多调用一次 `close`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportHandle(pub u64);

/// 请求结束时的粗粒度状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Failure,
    Other,
}

/// 响应头里与下载相关的部分
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseInfo {
    /// HTTP 状态码
    pub status: u16,
    /// 本次响应体长度（`Content-Length`）
    pub content_length: Option<u64>,
    /// 资源总长度（`Content-Range` 的 `/total` 部分）
    pub total_length: Option<u64>,
    /// 是否声明 `Accept-Ranges: bytes`
    pub accept_ranges: bool,
    /// 去掉参数后的 `Content-Type`
    pub mime_type: Option<String>,
    pub last_modified: Option<DateTime<FixedOffset>>,
}

impl ResponseInfo {
    /// `206 Partial Content`
    pub fn is_partial(&self) -> bool {
        self.status == 206
    }

    /// 服务器是否能按区间返回数据
    pub fn supports_ranges(&self) -> bool {
        self.accept_ranges || self.is_partial()
    }
}

/// `perform` 每次返回的事件，按到达顺序排列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// 响应头到达，在该句柄的任何 `Data` 之前
    Response {
        handle: TransportHandle,
        info: ResponseInfo,
    },
    Data {
        handle: TransportHandle,
        bytes: Bytes,
    },
    /// 每个句柄恰好一次，且在最后
    Complete {
        handle: TransportHandle,
        status: StatusClass,
    },
}

impl TransportEvent {
    pub fn handle(&self) -> TransportHandle {
        match self {
            Self::Response { handle, .. }
            | Self::Data { handle, .. }
            | Self::Complete { handle, .. } => *handle,
        }
    }
}

/// 从 `Content-Type` 中去掉 `;` 之后的参数。
pub fn strip_mime_params(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

/// 解析 `Content-Range: bytes a-b/total` 的 total；`*` 或格式不对时为 `None`。
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}
