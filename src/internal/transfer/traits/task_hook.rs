//! 任务钩子：在「日志 / 出错 / 完成 / 状态变化」时插入自定义逻辑。
//!
//! 使用方式二选一（可混用）：
//! - **单阶段**：用 `on_log` / `on_error` / `on_finish` / `on_state_change` 传入闭包；
//! - **完整钩子**：实现本 trait，通过任务构建器的 `with_hook` 注册。
//!
//! 钩子在 `tick` 内同步调用，不应阻塞。

use crate::internal::transfer::structs::{InternalState, TransferError};

pub trait TaskHook {
    /// 任务内部的日志行（会话开关、拆分等），与 tracing 输出同步。
    fn on_log(&mut self, _message: &str) {}

    /// 任务进入 `Error` 时调用一次。
    fn on_error(&mut self, _error: &TransferError) {}

    /// 任务下载完成、文件已关闭后调用一次。
    fn on_finish(&mut self) {}

    /// 内部状态变化，粗粒度状态可由 `TaskState::from` 得到。
    fn on_state_change(&mut self, _from: InternalState, _to: InternalState) {}
}
