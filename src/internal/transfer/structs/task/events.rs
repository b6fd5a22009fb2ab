//! 传输事件分发与会话结束后的再平衡。

use bytes::Bytes;
use tracing::warn;

use crate::internal::transfer::structs::session::{SessionId, WriteTarget};
use crate::internal::transfer::structs::{
    InternalState, ResponseInfo, StatusClass, TransferError, TransportEvent,
};
use crate::internal::transfer::traits::Transport;

use super::Task;

impl Task {
    /// 处理一个属于本任务的事件；致命错误在这里转为 `Error` 状态。
    pub(crate) fn on_event(&mut self, transport: &mut dyn Transport, event: TransportEvent) {
        if self.state.is_terminal() {
            return;
        }
        let Some(&sid) = self.handles.get(&event.handle()) else {
            return;
        };
        let result = match event {
            TransportEvent::Response { info, .. } => self.on_response(transport, sid, info),
            TransportEvent::Data { bytes, .. } => self.on_data(transport, sid, bytes),
            TransportEvent::Complete { status, .. } => self.on_complete(transport, sid, status),
        };
        if let Err(e) = result {
            self.fail(transport, e);
        }
    }

    fn on_response(
        &mut self,
        transport: &mut dyn Transport,
        sid: SessionId,
        info: ResponseInfo,
    ) -> Result<(), TransferError> {
        let ok = (200..300).contains(&info.status);
        let ranged_start = self.sessions.get(&sid).map(|s| s.start()).unwrap_or(0);
        // 中途起始的区间请求拿到完整响应体，说明服务器忽略了 Range
        if ok && ranged_start > 0 && !info.is_partial() {
            return Err(TransferError::RangeNotSupported);
        }
        if let Some(session) = self.sessions.get_mut(&sid) {
            session.set_response(info);
        }
        if ok && self.state == InternalState::Prepare {
            self.initialize(transport, sid)?;
        }
        Ok(())
    }

    fn on_data(
        &mut self,
        transport: &mut dyn Transport,
        sid: SessionId,
        bytes: Bytes,
    ) -> Result<(), TransferError> {
        if self.state == InternalState::Prepare {
            self.initialize(transport, sid)?;
        }
        if !matches!(
            self.state,
            InternalState::Download | InternalState::DownloadWithoutLength
        ) {
            return Ok(());
        }
        let Some(session) = self.sessions.get_mut(&sid) else {
            return Ok(());
        };
        let consumed = session.on_data(
            &bytes,
            WriteTarget {
                file: self.file.as_mut(),
                bitmap: self.download_map.as_mut(),
                downloaded: &mut self.downloaded,
            },
        )?;
        let exhausted = session.is_exhausted();
        if consumed > 0 {
            self.failures = 0;
        }
        if exhausted {
            self.queue_finished(sid);
        }
        Ok(())
    }

    fn on_complete(
        &mut self,
        transport: &mut dyn Transport,
        sid: SessionId,
        status: StatusClass,
    ) -> Result<(), TransferError> {
        let mut stalled = false;
        if let Some(session) = self.sessions.get_mut(&sid) {
            session.set_status(status);
            // 成功结束却一个字节都没给：同样算一次失败，否则会反复重开同一个缺口
            stalled = session.remaining().is_some_and(|r| r > 0) && session.pos() == session.start();
        }
        if status == StatusClass::Success && self.state == InternalState::Prepare {
            // 没有响应头也没有数据就结束了：按长度未知处理
            self.initialize(transport, sid)?;
        }
        if status != StatusClass::Success || stalled {
            self.failures += 1;
            warn!(task = self.id, session = sid, ?status, failures = self.failures, "会话失败");
            self.log(format!("会话 {sid} 失败，区间保留待重新分配"));
            let cap = self.config.retry_count;
            if cap > 0 && self.failures > cap {
                return Err(TransferError::RetriesExhausted(self.failures));
            }
        }
        self.queue_finished(sid);
        Ok(())
    }

    fn queue_finished(&mut self, sid: SessionId) {
        if !self.finished.contains(&sid) {
            self.finished.push(sid);
        }
    }

    /// tick 末尾：逐个处理本 tick 内结束的会话。
    pub(crate) fn process_finished(&mut self, transport: &mut dyn Transport) {
        let queue = std::mem::take(&mut self.finished);
        for sid in queue {
            if self.state.is_terminal() {
                break;
            }
            if let Err(e) = self.rebalance(transport, sid) {
                self.fail(transport, e);
            }
        }
    }

    /// 关闭一个结束的会话，然后：补一个未覆盖的缺口 / 拆分最大会话 / 判定完成。
    fn rebalance(&mut self, transport: &mut dyn Transport, sid: SessionId) -> Result<(), TransferError> {
        let Some(status) = self.close_session(transport, sid) else {
            return Ok(());
        };

        match self.state {
            InternalState::Prepare => {
                // 探测失败：重新探测
                self.open_probe(transport)
            }
            InternalState::DownloadWithoutLength => match status {
                Some(StatusClass::Success) => self.finish(),
                _ => Err(TransferError::TransportRequest(
                    "长度未知的下载未能完整结束".to_string(),
                )),
            },
            InternalState::Download => {
                if let Some(gap) = self.first_uncovered_gap() {
                    self.open_session(transport, gap.start, Some(gap.end - gap.start))?;
                } else if !self.sessions.is_empty() {
                    self.split_largest(transport)?;
                } else {
                    return self.finish();
                }
                self.check_invariants()
            }
            _ => Ok(()),
        }
    }

    /// 下载结束：核对计数、关闭文件、进入 `Finish` 并通知钩子。
    pub(super) fn finish(&mut self) -> Result<(), TransferError> {
        if self.download_map.is_none() {
            // 长度未知的下载结束时，总大小就是实际收到的字节数
            self.total_size = self.downloaded;
        }
        if let Some(map) = self.download_map.as_ref() {
            if !map.is_complete() {
                return Err(TransferError::InvariantViolation(
                    "没有会话也没有缺口，但位图未满".to_string(),
                ));
            }
            if self.downloaded != self.total_size || map.completed_bytes() != self.total_size {
                let msg = format!(
                    "已下载 {} 字节，位图 {} 字节，总大小 {}",
                    self.downloaded,
                    map.completed_bytes(),
                    self.total_size
                );
                debug_assert!(false, "{msg}");
                return Err(TransferError::InvariantViolation(msg));
            }
        }
        if self.file.is_open() {
            self.file
                .close()
                .map_err(|e| TransferError::file_io("关闭", e))?;
        }
        self.log(format!("下载完成: {} 字节", self.downloaded));
        self.transition(InternalState::Finish);
        self.hooks.run_on_finish();
        Ok(())
    }
}
