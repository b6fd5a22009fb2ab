//! 协议接口：按地址选择处理者，并把任务交给它执行。

use crate::internal::transfer::structs::{ResumeData, Task, TaskBuilder, TaskId, TransferError};

pub trait Protocol {
    fn name(&self) -> &str;

    /// 能否处理该地址
    fn can_process(&self, uri: &str) -> bool;

    /// 默认任务配置（XML 文本）
    fn default_options(&self) -> Result<String, TransferError>;

    fn add_task(&mut self, builder: TaskBuilder) -> Result<TaskId, TransferError>;

    /// 移除任务并返回它；会话先于文件关闭。
    fn remove_task(&mut self, id: TaskId) -> Result<Task, TransferError>;

    /// 推进一步，返回仍在进行中的任务数
    fn perform_download(&mut self) -> usize;

    fn task(&self, id: TaskId) -> Option<&Task>;

    fn resume_data(&self, id: TaskId) -> Result<ResumeData, TransferError>;
}
