//! 传输层接口：引擎只依赖这里的约定，不关心套接字、TLS 或 HTTP 分帧。

use crate::internal::transfer::structs::{
    RangeRequest, TransferError, TransportEvent, TransportHandle,
};

/// 字节区间传输。
///
/// 每个句柄先产生零或多个 `Response`/`Data` 事件，最后恰好一个 `Complete`。
/// `perform` 必须不阻塞：只交付已经就绪的事件。
pub trait Transport {
    /// 发起一个区间请求；失败即 `TransportSetup`，对任务是致命的。
    fn open(&mut self, request: RangeRequest) -> Result<TransportHandle, TransferError>;

    /// 推进所有在途请求一步，返回本次就绪的事件。
    fn perform(&mut self) -> Vec<TransportEvent>;

    /// 释放句柄；已关闭句柄的后续事件不会再出现在 `perform` 中。
    fn close(&mut self, handle: TransportHandle);
}
