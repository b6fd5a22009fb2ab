//! 引擎：每个 tick 推进一次传输层，把事件分发给任务，再统一做再平衡。
//!
//! 单线程、协作式；`tick` 不阻塞，等待就绪是调用方反应器的事。

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::internal::transfer::traits::Transport;

use super::resume_data::ResumeData;
use super::task::{Task, TaskId};
use super::task_builder::TaskBuilder;
use super::task_state::TaskState;
use super::transfer_error::TransferError;

pub struct Engine {
    /// 任务在传输层之前声明：析构时先拆任务
    tasks: BTreeMap<TaskId, Task>,
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("tasks", &self.tasks).finish()
    }
}

impl Engine {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            tasks: BTreeMap::new(),
            transport: Box::new(transport),
        }
    }

    /// 最小的未被占用的编号
    fn next_id(&self) -> TaskId {
        (0..)
            .find(|id| !self.tasks.contains_key(id))
            .unwrap_or(TaskId::MAX)
    }

    /// 创建任务并立即发出探测会话；配置或续传数据无效时返回错误，不创建任务。
    ///
    /// 启动阶段的传输失败不会在这里返回，而是让任务进入 `Error`。
    pub fn add_task(&mut self, builder: TaskBuilder) -> Result<TaskId, TransferError> {
        let id = self.next_id();
        let mut task = Task::new(id, builder)?;
        debug!(task = id, uri = task.uri(), "添加任务");
        task.start(self.transport.as_mut());
        task.publish_progress();
        self.tasks.insert(id, task);
        Ok(id)
    }

    /// 移除任务：先关闭所有会话，再关闭文件。
    pub fn remove_task(&mut self, id: TaskId) -> Result<Task, TransferError> {
        let mut task = self
            .tasks
            .remove(&id)
            .ok_or(TransferError::TaskNotFound(id))?;
        task.teardown(self.transport.as_mut());
        debug!(task = id, "移除任务");
        Ok(task)
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn resume_data(&self, id: TaskId) -> Result<ResumeData, TransferError> {
        self.tasks
            .get(&id)
            .map(Task::resume_data)
            .ok_or(TransferError::TaskNotFound(id))
    }

    /// 尚未到达 `Finish`/`Error` 的任务数
    pub fn active_tasks(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| !t.state().is_terminal())
            .count()
    }

    /// 推进一步：先交付本 tick 的全部事件，再处理结束的会话，最后发布进度。
    ///
    /// 返回仍在进行中的任务数；调用方循环调用直到返回 0。
    pub fn tick(&mut self) -> usize {
        let events = self.transport.perform();
        for event in events {
            let handle = event.handle();
            match self.tasks.values_mut().find(|t| t.owns(handle)) {
                Some(task) => task.on_event(self.transport.as_mut(), event),
                None => trace!(?handle, "丢弃已关闭句柄的事件"),
            }
        }
        for task in self.tasks.values_mut() {
            task.process_finished(self.transport.as_mut());
            task.publish_progress();
        }
        self.active_tasks()
    }

    /// 持续 tick 直到没有进行中的任务，或 `max_ticks` 用完；返回剩余进行中的任务数。
    pub fn run_until_idle(&mut self, max_ticks: usize) -> usize {
        let mut active = self.active_tasks();
        for _ in 0..max_ticks {
            if active == 0 {
                break;
            }
            active = self.tick();
        }
        active
    }

    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.get(&id).map(Task::state)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        for task in self.tasks.values_mut() {
            task.teardown(self.transport.as_mut());
        }
    }
}
