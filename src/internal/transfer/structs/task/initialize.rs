//! 探测会话的首个响应：确定总长度、准备文件与位图、进入下载状态。

use crate::internal::transfer::structs::session::SessionId;
use crate::internal::transfer::structs::{
    InternalState, MAX_BITMAP_BLOCKS, ProgressBitmap, TransferError,
};
use crate::internal::transfer::traits::{OpenMode, Transport};

use super::Task;

impl Task {
    /// 同步执行：可能把探测会话定长并立即拆分出更多会话。
    ///
    /// 非 2xx 的响应不会触发初始化。
    pub(super) fn initialize(
        &mut self,
        transport: &mut dyn Transport,
        sid: SessionId,
    ) -> Result<(), TransferError> {
        let Some(probe) = self.sessions.get(&sid) else {
            return Ok(());
        };
        let info = probe.response().cloned().unwrap_or_default();
        if info.status != 0 && !(200..300).contains(&info.status) {
            return Ok(());
        }
        let probe_pos = probe.pos();

        self.mime_type = info.mime_type.clone();
        self.last_modified = info.last_modified;
        let total = info
            .total_length
            .or_else(|| info.content_length.map(|len| probe_pos + len));

        if let Some(map) = self.download_map.as_ref() {
            if total != Some(map.length()) {
                return Err(TransferError::ResumeMismatch(format!(
                    "续传总大小 {}，远程 {}",
                    map.length(),
                    total.map(|t| t.to_string()).unwrap_or_else(|| "未知".to_string())
                )));
            }
        }

        self.open_file()?;
        self.log(format!(
            "初始化: 总大小 {:?}，类型 {:?}",
            total, self.mime_type
        ));

        match total {
            None => {
                self.transition(InternalState::DownloadWithoutLength);
                Ok(())
            }
            Some(0) => {
                self.file
                    .resize(0)
                    .map_err(|e| TransferError::file_io("调整大小", e))?;
                self.transition(InternalState::DownloadWithoutLength);
                self.close_session(transport, sid);
                self.finish()
            }
            Some(total) => self.initialize_sized(transport, sid, total, info.supports_ranges()),
        }
    }

    fn initialize_sized(
        &mut self,
        transport: &mut dyn Transport,
        sid: SessionId,
        total: u64,
        supports_ranges: bool,
    ) -> Result<(), TransferError> {
        let b = self.config.bytes_per_block;
        if ProgressBitmap::checked_blocks(total, b).is_none() {
            return Err(TransferError::InvalidConfig(format!(
                "远程大小 {total} 按块大小 {b} 超过 {MAX_BITMAP_BLOCKS} 块上限，请增大块大小"
            )));
        }

        // 先调整文件大小，失败时不分配位图
        self.file
            .resize(total)
            .map_err(|e| TransferError::file_io("调整大小", e))?;
        self.total_size = total;

        let map = self
            .download_map
            .get_or_insert_with(|| ProgressBitmap::new(total, b));

        // 探测会话定长到它所在的第一个未完成区间的末尾
        let from = map.position_by_length(self.sessions.get(&sid).map(|s| s.pos()).unwrap_or(0));
        let end_bit = map.find(true, from);
        let gap_end = if end_bit >= map.size() {
            total
        } else {
            end_bit as u64 * map.block_size()
        };
        self.downloaded = map.completed_bytes();

        let mut valid = ProgressBitmap::new(total, b);
        valid.set_all(true);
        self.valid_map = Some(valid);

        if let Some(probe) = self.sessions.get_mut(&sid) {
            probe.bound_to(gap_end);
        }
        self.single_session = !supports_ranges;
        if self.single_session {
            self.log("服务器不支持区间请求，使用单会话".to_string());
        }
        self.transition(InternalState::Download);

        if !self.single_session {
            self.initial_split(transport)?;
        }
        self.check_invariants()
    }

    fn open_file(&mut self) -> Result<(), TransferError> {
        if self.file.is_open() {
            return Ok(());
        }
        let path = self.output_path();
        let mode = if self.resumed {
            OpenMode::Resume
        } else {
            OpenMode::Truncate
        };
        self.file
            .open(&path, mode)
            .map_err(|e| TransferError::file_io("打开", e))
    }
}
