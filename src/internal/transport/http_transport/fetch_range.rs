//! 单段 Range 请求：发请求、上报响应头、流式上报数据块、最后上报结束状态。

use chrono::DateTime;
use futures_util::StreamExt;
use reqwest::header::{
    ACCEPT_RANGES, CONTENT_RANGE, CONTENT_TYPE, HeaderName, LAST_MODIFIED, RANGE, REFERER,
    USER_AGENT,
};
use reqwest::{Client, Response};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::internal::transfer::structs::{
    RangeRequest, ResponseInfo, StatusClass, TransferError, TransportEvent, TransportHandle,
    parse_content_range_total, strip_mime_params,
};

/// 执行单段请求时的参数（形参超过 3 个，用 struct 承载）。
pub(super) struct FetchRangeParams {
    pub client: Client,
    pub request: RangeRequest,
    pub handle: TransportHandle,
    pub sender: mpsc::UnboundedSender<TransportEvent>,
}

/// 无论成功与否，最后都会发送恰好一个 `Complete`。
pub(super) async fn fetch_range(params: FetchRangeParams) {
    let status = match stream_range(&params).await {
        Ok(status) => status,
        Err(e) => {
            warn!(handle = ?params.handle, "请求失败: {e}");
            StatusClass::Failure
        }
    };
    let complete = TransportEvent::Complete {
        handle: params.handle,
        status,
    };
    // 接收端已释放说明传输已关闭，结束事件无人处理
    if params.sender.send(complete).is_err() {
        trace!(handle = ?params.handle, "通道已关闭，丢弃结束事件");
    }
}

async fn stream_range(params: &FetchRangeParams) -> Result<StatusClass, TransferError> {
    let request = &params.request;
    let mut builder = params.client.get(&request.uri);
    if let Some(range) = request.range_header() {
        builder = builder.header(RANGE, range);
    }
    if let Some(referer) = request.referer.as_deref() {
        builder = builder.header(REFERER, referer);
    }
    if let Some(agent) = request.user_agent.as_deref() {
        builder = builder.header(USER_AGENT, agent);
    }
    let resp = builder.send().await?;

    let ok = resp.status().is_success();
    let info = response_info(&resp);
    if params
        .sender
        .send(TransportEvent::Response {
            handle: params.handle,
            info,
        })
        .is_err()
    {
        return Ok(StatusClass::Other);
    }
    if !ok {
        return Ok(StatusClass::Failure);
    }

    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        if bytes.is_empty() {
            continue;
        }
        let event = TransportEvent::Data {
            handle: params.handle,
            bytes,
        };
        if params.sender.send(event).is_err() {
            return Ok(StatusClass::Other);
        }
    }
    Ok(StatusClass::Success)
}

fn response_info(resp: &Response) -> ResponseInfo {
    let headers = resp.headers();
    let text = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok());
    ResponseInfo {
        status: resp.status().as_u16(),
        content_length: resp.content_length(),
        total_length: text(CONTENT_RANGE).and_then(parse_content_range_total),
        accept_ranges: text(ACCEPT_RANGES)
            .map(|v| v.split(',').any(|unit| unit.trim().eq_ignore_ascii_case("bytes")))
            .unwrap_or(false),
        mime_type: text(CONTENT_TYPE)
            .map(strip_mime_params)
            .filter(|m| !m.is_empty()),
        last_modified: text(LAST_MODIFIED).and_then(|v| DateTime::parse_from_rfc2822(v).ok()),
    }
}
