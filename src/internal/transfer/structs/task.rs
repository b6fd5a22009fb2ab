//! 下载任务：拥有输出文件、位图、配置与全部活跃会话，实现状态机与拆分算法。
//!
//! 会话只通过 `sessions` 这一处持有；移除会话与关闭其传输句柄是同一个操作。
//! 字段顺序保证析构时会话先于文件释放。

mod events;
mod initialize;
mod split;

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, error, info};

use crate::internal::states::unlock_reactive::UnlockReactiveProperty;
use crate::internal::transfer::traits::{FileStore, Transport};

use super::file_name::guess_file_name;
use super::http_config::HttpConfig;
use super::progress_bitmap::ProgressBitmap;
use super::range_request::RangeRequest;
use super::resume_data::ResumeData;
use super::session::{Session, SessionId};
use super::task_builder::TaskBuilder;
use super::task_hooks_container::TaskHooksContainer;
use super::task_progress::TaskProgress;
use super::task_state::{InternalState, TaskState};
use super::transfer_error::TransferError;
use super::transport_event::{StatusClass, TransportHandle};

/// 引擎内任务编号
pub type TaskId = u32;

pub struct Task {
    id: TaskId,
    uri: String,
    output_dir: PathBuf,
    output_name: Option<String>,
    comment: String,
    config: HttpConfig,
    state: InternalState,
    error: Option<TransferError>,
    mime_type: Option<String>,
    last_modified: Option<DateTime<FixedOffset>>,
    /// 0 表示尚未确定
    total_size: u64,
    downloaded: u64,
    download_map: Option<ProgressBitmap>,
    /// 已知未被污染的区间，留给后续完整性校验
    valid_map: Option<ProgressBitmap>,
    /// 从续传数据恢复，而非全新下载
    resumed: bool,
    /// 服务器不支持区间请求时只保留一个会话
    single_session: bool,
    /// 连续失败的会话数，写入成功后清零
    failures: usize,
    next_session_id: SessionId,
    sessions: BTreeMap<SessionId, Session>,
    handles: HashMap<TransportHandle, SessionId>,
    /// 本 tick 内写满或结束的会话，tick 末尾统一再平衡
    finished: Vec<SessionId>,
    hooks: TaskHooksContainer,
    progress: UnlockReactiveProperty<TaskProgress>,
    file: Box<dyn FileStore>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .field("state", &self.state)
            .field("total_size", &self.total_size)
            .field("downloaded", &self.downloaded)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl Task {
    pub(crate) fn new(id: TaskId, builder: TaskBuilder) -> Result<Self, TransferError> {
        let TaskBuilder {
            uri,
            output_dir,
            output_name,
            comment,
            mut config,
            resume,
            file,
            hooks,
        } = builder;

        let mut download_map = None;
        if let Some(data) = resume.as_ref() {
            data.apply_to(&mut config);
            download_map = data.bitmap()?;
        }
        config.validate()?;

        let total_size = download_map.as_ref().map(|m| m.length()).unwrap_or(0);
        let downloaded = download_map
            .as_ref()
            .map(|m| m.completed_bytes())
            .unwrap_or(0);

        Ok(Self {
            id,
            uri,
            output_dir,
            output_name,
            comment,
            config,
            state: InternalState::Invalid,
            error: None,
            mime_type: None,
            last_modified: None,
            total_size,
            downloaded,
            resumed: download_map.is_some(),
            download_map,
            valid_map: None,
            single_session: false,
            failures: 0,
            next_session_id: 0,
            sessions: BTreeMap::new(),
            handles: HashMap::new(),
            finished: Vec::new(),
            hooks,
            progress: UnlockReactiveProperty::new(TaskProgress {
                bytes_done: downloaded,
                total: (total_size > 0).then_some(total_size),
                sessions: 0,
            }),
            file,
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// 当前配置的 XML 文本
    pub fn options(&self) -> Result<String, TransferError> {
        self.config.to_xml()
    }

    pub fn state(&self) -> TaskState {
        self.state.into()
    }

    pub fn internal_state(&self) -> InternalState {
        self.state
    }

    pub fn error(&self) -> Option<&TransferError> {
        self.error.as_ref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn last_modified(&self) -> Option<DateTime<FixedOffset>> {
        self.last_modified
    }

    /// 总字节数，0 表示未知
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    pub fn file_name(&self) -> String {
        self.output_name
            .clone()
            .unwrap_or_else(|| guess_file_name(&self.uri))
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(self.file_name())
    }

    pub fn download_bitmap(&self) -> Option<&ProgressBitmap> {
        self.download_map.as_ref()
    }

    pub fn valid_bitmap(&self) -> Option<&ProgressBitmap> {
        self.valid_map.as_ref()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// 活跃会话认领的字节区间，按起点排序；长度未知的探测会话不计入。
    pub fn session_ranges(&self) -> Vec<Range<u64>> {
        let mut ranges: Vec<Range<u64>> = self
            .sessions
            .values()
            .filter_map(|s| s.end().map(|end| s.pos()..end))
            .collect();
        ranges.sort_by_key(|r| r.start);
        ranges
    }

    /// 进度属性；可 `watch` 监听每个 tick 的变化。
    pub fn progress(&self) -> UnlockReactiveProperty<TaskProgress> {
        self.progress.clone()
    }

    /// 续传数据：配置 + 当前位图。
    pub fn resume_data(&self) -> ResumeData {
        ResumeData::new(&self.config, self.download_map.as_ref())
    }

    pub(crate) fn owns(&self, handle: TransportHandle) -> bool {
        self.handles.contains_key(&handle)
    }

    /// 发出探测会话。续传且位图已满时直接完成，不产生任何网络请求。
    pub(crate) fn start(&mut self, transport: &mut dyn Transport) {
        if self.state != InternalState::Invalid {
            return;
        }
        if self.download_map.as_ref().is_some_and(|m| m.is_complete()) {
            self.log(format!("续传位图已完整，直接完成: {}", self.uri));
            self.transition(InternalState::Finish);
            self.hooks.run_on_finish();
            return;
        }
        if let Err(e) = self.open_probe(transport) {
            self.fail(transport, e);
        }
    }

    /// 在第一个未完成字节处发出长度未知的探测请求，进入 `Prepare`。
    fn open_probe(&mut self, transport: &mut dyn Transport) -> Result<(), TransferError> {
        let start = match self.download_map.as_ref() {
            Some(map) => map.find(false, 0) as u64 * map.block_size(),
            None => 0,
        };
        self.open_session(transport, start, None)?;
        self.transition(InternalState::Prepare);
        Ok(())
    }

    fn open_session(
        &mut self,
        transport: &mut dyn Transport,
        start: u64,
        length: Option<u64>,
    ) -> Result<SessionId, TransferError> {
        let id = self.next_session_id;
        self.next_session_id += 1;
        let session = Session::open(
            transport,
            id,
            RangeRequest {
                uri: self.uri.clone(),
                start,
                length,
                referer: self.config.referer.clone(),
                user_agent: self.config.user_agent.clone(),
            },
        )?;
        match length {
            Some(len) => self.log(format!("会话 {id} 开始: [{start}, {})", start + len)),
            None => self.log(format!("会话 {id} 开始: [{start}, ?)")),
        }
        self.handles.insert(session.handle(), id);
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// 从活跃集合移除并关闭句柄，两件事总在一起发生；会话不存在时返回 `None`。
    fn close_session(
        &mut self,
        transport: &mut dyn Transport,
        id: SessionId,
    ) -> Option<Option<StatusClass>> {
        let session = self.sessions.remove(&id)?;
        self.handles.remove(&session.handle());
        debug!(task = self.id, session = id, pos = session.pos(), "关闭会话");
        let status = session.status();
        session.close(transport);
        Some(status)
    }

    /// 关闭全部会话后再关闭文件。
    pub(crate) fn teardown(&mut self, transport: &mut dyn Transport) {
        for (_, session) in std::mem::take(&mut self.sessions) {
            session.close(transport);
        }
        self.handles.clear();
        self.finished.clear();
        if self.file.is_open() {
            if let Err(e) = self.file.close() {
                error!(task = self.id, "关闭文件失败: {e}");
            }
        }
    }

    /// 进入 `Error`：记录错误、拆除会话与文件，然后通知钩子。
    pub(crate) fn fail(&mut self, transport: &mut dyn Transport, err: TransferError) {
        if self.state.is_terminal() {
            return;
        }
        error!(task = self.id, kind = ?err.kind(), "任务失败: {err}");
        self.hooks.run_on_log(&format!("任务失败: {err}"));
        self.teardown(transport);
        self.transition(InternalState::Error);
        self.hooks.run_on_error(&err);
        self.error = Some(err);
    }

    fn transition(&mut self, to: InternalState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        info!(task = self.id, ?from, ?to, "任务状态变化");
        self.hooks.run_on_state_change(from, to);
    }

    fn log(&mut self, message: String) {
        debug!(task = self.id, "{message}");
        self.hooks.run_on_log(&message);
    }

    /// 在 tick 末尾发布进度快照。
    pub(crate) fn publish_progress(&self) {
        self.progress.update(TaskProgress {
            bytes_done: self.downloaded,
            total: (self.total_size > 0).then_some(self.total_size),
            sessions: self.sessions.len(),
        });
    }

    /// 活跃会话两两不相交，且都落在未完成区域内。
    fn check_invariants(&self) -> Result<(), TransferError> {
        let Some(map) = self.download_map.as_ref() else {
            return Ok(());
        };
        let ranges = self.session_ranges();
        for pair in ranges.windows(2) {
            if pair[0].end > pair[1].start {
                let msg = format!("会话区间重叠: {:?} 与 {:?}", pair[0], pair[1]);
                debug_assert!(false, "{msg}");
                return Err(TransferError::InvariantViolation(msg));
            }
        }
        let b = map.block_size();
        for session in self.sessions.values() {
            if session.remaining().is_none_or(|r| r == 0) {
                continue;
            }
            let span = session.block_span(b);
            if let Some(done) = span.clone().find(|&i| map.get(i)) {
                let msg = format!("会话 {} 覆盖已完成的块 {done}", session.id());
                debug_assert!(false, "{msg}");
                return Err(TransferError::InvariantViolation(msg));
            }
        }
        Ok(())
    }
}
