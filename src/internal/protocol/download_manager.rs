//! 下载管理器：按地址分派协议，维护任务记录，支持暂停（保存续传数据）与恢复。
//!
//! 管理器的任务编号与引擎内编号相互独立：任务停止后引擎里的任务被移除，
//! 记录与续传数据留在管理器里，再次启动时交给引擎新建。

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use tracing::{info, warn};

use crate::internal::protocol::manager_snapshot::{ManagerSnapshot, TaskRecord};
use crate::internal::protocol::traits::Protocol;
use crate::internal::transfer::structs::{
    HttpConfig, ResumeData, TaskBuilder, TaskId, TaskState, TransferError,
};

/// 管理器内任务编号
pub type ManagerTaskId = u32;

/// 添加任务时的参数（形参超过 3 个，用 struct 承载）。
#[derive(Debug, Clone, Default)]
pub struct AddTaskParams {
    pub uri: String,
    pub output_dir: PathBuf,
    /// 为空时从地址推断
    pub output_name: Option<String>,
    /// XML 配置；为空时使用协议默认值
    pub options: Option<String>,
    pub comment: String,
}

type StateListener = Box<dyn FnMut(ManagerTaskId, TaskState)>;

#[derive(Default)]
pub struct DownloadManager {
    protocols: Vec<Box<dyn Protocol>>,
    records: BTreeMap<ManagerTaskId, TaskRecord>,
    /// 正在执行的任务：协议下标与引擎内编号
    running: HashMap<ManagerTaskId, (usize, TaskId)>,
    listeners: Vec<StateListener>,
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("protocols", &self.protocols.len())
            .field("records", &self.records)
            .field("running", &self.running)
            .finish()
    }
}

impl DownloadManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_protocol(mut self, protocol: impl Protocol + 'static) -> Self {
        self.register(protocol);
        self
    }

    pub fn register(&mut self, protocol: impl Protocol + 'static) {
        self.protocols.push(Box::new(protocol));
    }

    /// 任务状态变化时调用；可注册多个。
    pub fn on_state_change<F>(&mut self, f: F)
    where
        F: FnMut(ManagerTaskId, TaskState) + 'static,
    {
        self.listeners.push(Box::new(f));
    }

    fn protocol_for(&self, uri: &str) -> Option<usize> {
        self.protocols.iter().position(|p| p.can_process(uri))
    }

    pub fn can_download(&self, uri: &str) -> bool {
        self.protocol_for(uri).is_some()
    }

    /// 处理该地址的协议的默认配置
    pub fn task_options(&self, uri: &str) -> Result<String, TransferError> {
        let p = self
            .protocol_for(uri)
            .ok_or_else(|| TransferError::UnsupportedUri(uri.to_string()))?;
        self.protocols[p].default_options()
    }

    /// 登记一个任务，状态为 `Wait`，需要 [`start_task`](Self::start_task) 才会开始。
    pub fn add_task(&mut self, params: AddTaskParams) -> Result<ManagerTaskId, TransferError> {
        if !self.can_download(&params.uri) {
            return Err(TransferError::UnsupportedUri(params.uri));
        }
        let options = match params.options.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(xml) => HttpConfig::from_xml(xml)?,
            None => HttpConfig::default(),
        };
        let id = (0..)
            .find(|id| !self.records.contains_key(id))
            .unwrap_or(ManagerTaskId::MAX);
        self.records.insert(
            id,
            TaskRecord {
                id,
                uri: params.uri,
                output_dir: params.output_dir,
                output_name: params.output_name.filter(|n| !n.is_empty()),
                comment: params.comment,
                state: TaskState::Wait,
                total_size: 0,
                downloaded: 0,
                error: None,
                options,
                resume: None,
            },
        );
        info!(task = id, "登记任务");
        Ok(id)
    }

    /// 交给协议执行；有续传数据时从断点继续。
    pub fn start_task(&mut self, id: ManagerTaskId) -> Result<(), TransferError> {
        if self.running.contains_key(&id) {
            return Ok(());
        }
        let record = self.records.get(&id).ok_or(TransferError::TaskNotFound(id))?;
        if record.state == TaskState::Finish {
            return Err(TransferError::InvalidTaskState("任务已完成".to_string()));
        }
        let p = self
            .protocol_for(&record.uri)
            .ok_or_else(|| TransferError::UnsupportedUri(record.uri.clone()))?;

        let mut builder = TaskBuilder::new(record.uri.clone())
            .save_to(&record.output_dir)
            .comment(record.comment.clone())
            .config(record.options.clone());
        if let Some(name) = record.output_name.as_ref() {
            builder = builder.file_name(name.clone());
        }
        if let Some(resume) = record.resume.as_ref() {
            builder = builder.resume_from(resume.clone());
        }

        let task_id = self.protocols[p].add_task(builder)?;
        self.running.insert(id, (p, task_id));
        if let Some(record) = self.records.get_mut(&id) {
            record.error = None;
        }
        self.sync(id);
        Ok(())
    }

    /// 停止任务：保存续传数据，关闭会话与文件，回到 `Wait`。
    pub fn stop_task(&mut self, id: ManagerTaskId) -> Result<(), TransferError> {
        if !self.records.contains_key(&id) {
            return Err(TransferError::TaskNotFound(id));
        }
        let Some((p, task_id)) = self.running.remove(&id) else {
            return Ok(());
        };
        let resume = self.protocols[p].resume_data(task_id)?;
        self.protocols[p].remove_task(task_id)?;
        if let Some(record) = self.records.get_mut(&id) {
            record.resume = (resume.total_size > 0).then_some(resume);
        }
        self.set_state(id, TaskState::Wait);
        Ok(())
    }

    /// 删除任务记录；正在执行时先停止，不保存续传数据。
    pub fn remove_task(&mut self, id: ManagerTaskId) -> Result<TaskRecord, TransferError> {
        if let Some((p, task_id)) = self.running.remove(&id) {
            if let Err(e) = self.protocols[p].remove_task(task_id) {
                warn!(task = id, "移除引擎任务失败: {e}");
            }
        }
        self.records.remove(&id).ok_or(TransferError::TaskNotFound(id))
    }

    /// 推进所有协议一步，同步任务记录；返回仍在执行的任务数。
    pub fn perform(&mut self) -> usize {
        for protocol in self.protocols.iter_mut() {
            protocol.perform_download();
        }
        let ids: Vec<ManagerTaskId> = self.running.keys().copied().collect();
        for id in ids {
            self.sync(id);
        }
        self.running.len()
    }

    /// 把引擎里的任务状态抄到记录上；终态的任务从引擎移除。
    fn sync(&mut self, id: ManagerTaskId) {
        let Some(&(p, task_id)) = self.running.get(&id) else {
            return;
        };
        let Some(task) = self.protocols[p].task(task_id) else {
            self.running.remove(&id);
            return;
        };
        let state = task.state();
        let error = task.error().map(|e| e.to_string());
        let total_size = task.total_size();
        let downloaded = task.downloaded();
        let resume = task.resume_data();

        if let Some(record) = self.records.get_mut(&id) {
            record.total_size = total_size;
            record.downloaded = downloaded;
            match state {
                TaskState::Finish => record.resume = None,
                TaskState::Error => {
                    record.error = error;
                    record.resume = (resume.total_size > 0).then_some(resume);
                }
                _ => {}
            }
        }
        if state.is_terminal() {
            self.running.remove(&id);
            if let Err(e) = self.protocols[p].remove_task(task_id) {
                warn!(task = id, "移除引擎任务失败: {e}");
            }
        }
        self.set_state(id, state);
    }

    fn set_state(&mut self, id: ManagerTaskId, state: TaskState) {
        let Some(record) = self.records.get_mut(&id) else {
            return;
        };
        if record.state == state {
            return;
        }
        record.state = state;
        info!(task = id, ?state, "任务状态变化");
        for listener in self.listeners.iter_mut() {
            listener(id, state);
        }
    }

    pub fn state(&self, id: ManagerTaskId) -> Option<TaskState> {
        self.records.get(&id).map(|r| r.state)
    }

    pub fn record(&self, id: ManagerTaskId) -> Option<&TaskRecord> {
        self.records.get(&id)
    }

    pub fn records(&self) -> impl Iterator<Item = &TaskRecord> {
        self.records.values()
    }

    /// 正在执行任务的当前续传数据
    pub fn resume_data(&self, id: ManagerTaskId) -> Option<ResumeData> {
        match self.running.get(&id) {
            Some(&(p, task_id)) => self.protocols[p].resume_data(task_id).ok(),
            None => self.records.get(&id).and_then(|r| r.resume.clone()),
        }
    }

    /// 全部任务记录的快照；执行中的任务带上当前位图。
    pub fn save(&mut self) -> Result<String, TransferError> {
        let running: Vec<(ManagerTaskId, usize, TaskId)> = self
            .running
            .iter()
            .map(|(&id, &(p, task_id))| (id, p, task_id))
            .collect();
        for (id, p, task_id) in running {
            let resume = self.protocols[p].resume_data(task_id)?;
            if let Some(record) = self.records.get_mut(&id) {
                record.resume = (resume.total_size > 0).then_some(resume);
            }
        }
        ManagerSnapshot {
            tasks: self.records.values().cloned().collect(),
        }
        .to_xml()
    }

    /// 载入快照；同编号的记录被替换。除已完成的以外全部回到 `Wait`。
    pub fn load(&mut self, xml: &str) -> Result<(), TransferError> {
        let snapshot = ManagerSnapshot::from_xml(xml)?;
        for mut record in snapshot.tasks {
            if let Some((p, task_id)) = self.running.remove(&record.id) {
                if let Err(e) = self.protocols[p].remove_task(task_id) {
                    warn!(task = record.id, "移除引擎任务失败: {e}");
                }
            }
            if record.state != TaskState::Finish {
                record.state = TaskState::Wait;
            }
            self.records.insert(record.id, record);
        }
        Ok(())
    }
}
