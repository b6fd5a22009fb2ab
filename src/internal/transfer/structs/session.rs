//! 会话：一个在途的区间请求及其写入游标。

use std::ops::Range;

use crate::internal::transfer::traits::{FileStore, Transport};

use super::progress_bitmap::ProgressBitmap;
use super::range_request::RangeRequest;
use super::transfer_error::TransferError;
use super::transport_event::{ResponseInfo, StatusClass, TransportHandle};

/// 任务内会话的稳定编号
pub type SessionId = u64;

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    handle: TransportHandle,
    /// 请求发出时的起始位置
    start: u64,
    /// 写入游标
    pos: u64,
    /// 剩余字节；`None` 只用于尚未确定长度的探测会话
    remaining: Option<u64>,
    response: Option<ResponseInfo>,
    status: Option<StatusClass>,
}

/// 写入一块数据时需要的任务侧状态（形参超过 3 个，用 struct 承载）。
pub struct WriteTarget<'a> {
    pub file: &'a mut dyn FileStore,
    pub bitmap: Option<&'a mut ProgressBitmap>,
    pub downloaded: &'a mut u64,
}

impl Session {
    /// 通过传输层发起请求；`request.length` 为 `None` 时发出不带上界的请求。
    pub fn open(
        transport: &mut dyn Transport,
        id: SessionId,
        request: RangeRequest,
    ) -> Result<Self, TransferError> {
        let start = request.start;
        let remaining = request.length;
        let handle = transport.open(request)?;
        Ok(Self {
            id,
            handle,
            start,
            pos: start,
            remaining,
            response: None,
            status: None,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn handle(&self) -> TransportHandle {
        self.handle
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    /// 不含上界的结束位置；长度未知时为 `None`。
    pub fn end(&self) -> Option<u64> {
        self.remaining.map(|r| self.pos + r)
    }

    pub fn response(&self) -> Option<&ResponseInfo> {
        self.response.as_ref()
    }

    pub fn status(&self) -> Option<StatusClass> {
        self.status
    }

    /// 已写满目标区间
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    pub(crate) fn set_response(&mut self, info: ResponseInfo) {
        self.response = Some(info);
    }

    pub(crate) fn set_status(&mut self, status: StatusClass) {
        self.status = Some(status);
    }

    /// 把剩余长度改为 `end - pos`：探测会话定长或拆分时收缩前半段。
    pub(crate) fn bound_to(&mut self, end: u64) {
        debug_assert!(end >= self.pos);
        self.remaining = Some(end.saturating_sub(self.pos));
    }

    /// 会话当前认领的块 `[floor(pos/b), ceil((pos+remaining)/b))`。
    pub fn block_span(&self, block_size: u64) -> Range<usize> {
        let first = (self.pos / block_size) as usize;
        match self.end() {
            Some(end) => first..end.div_ceil(block_size) as usize,
            None => first..usize::MAX,
        }
    }

    /// 写入收到的数据，最多 `min(len, remaining)` 字节，返回实际消费的字节数。
    ///
    /// 超出目标区间的部分不写入；调用方看到 [`is_exhausted`](Self::is_exhausted) 后排队收尾。
    pub fn on_data(
        &mut self,
        bytes: &[u8],
        target: WriteTarget<'_>,
    ) -> Result<usize, TransferError> {
        let take = match self.remaining {
            Some(r) => (bytes.len() as u64).min(r) as usize,
            None => bytes.len(),
        };
        if take == 0 {
            return Ok(0);
        }

        target
            .file
            .seek(self.pos)
            .map_err(|e| TransferError::file_io("定位", e))?;
        let mut written = 0;
        while written < take {
            let n = target
                .file
                .write(&bytes[written..take])
                .map_err(|e| TransferError::file_io("写入", e))?;
            if n == 0 {
                return Err(TransferError::FileIo("写入返回 0 字节".to_string()));
            }
            written += n;
        }

        let begin = self.pos;
        self.pos += take as u64;
        if let Some(r) = self.remaining.as_mut() {
            *r -= take as u64;
        }

        match target.bitmap {
            Some(map) => {
                let before = map.completed_bytes();
                map.set_range_by_byte_offset(begin, self.pos, true);
                *target.downloaded += map.completed_bytes() - before;
            }
            None => *target.downloaded += take as u64,
        }
        Ok(take)
    }

    /// 释放传输句柄；消费自身，保证每个句柄只关闭一次。
    pub fn close(self, transport: &mut dyn Transport) {
        transport.close(self.handle);
    }
}
