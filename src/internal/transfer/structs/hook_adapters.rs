//! 单阶段钩子适配器：将闭包包装成 [`TaskHook`]，供构建器的 `on_xx` 使用。

use crate::internal::transfer::structs::{InternalState, TransferError};
use crate::internal::transfer::traits::TaskHook;

/// 仅实现「日志」的钩子适配器。
pub(crate) struct OnLogHookAdapter<F>(pub(crate) F);

impl<F> TaskHook for OnLogHookAdapter<F>
where
    F: FnMut(&str) + 'static,
{
    fn on_log(&mut self, message: &str) {
        (self.0)(message);
    }
}

/// 仅实现「出错」的钩子适配器。
pub(crate) struct OnErrorHookAdapter<F>(pub(crate) F);

impl<F> TaskHook for OnErrorHookAdapter<F>
where
    F: FnMut(&TransferError) + 'static,
{
    fn on_error(&mut self, error: &TransferError) {
        (self.0)(error);
    }
}

/// 仅实现「完成」的钩子适配器。
pub(crate) struct OnFinishHookAdapter<F>(pub(crate) F);

impl<F> TaskHook for OnFinishHookAdapter<F>
where
    F: FnMut() + 'static,
{
    fn on_finish(&mut self) {
        (self.0)();
    }
}

/// 仅实现「状态变化」的钩子适配器。
pub(crate) struct OnStateChangeHookAdapter<F>(pub(crate) F);

impl<F> TaskHook for OnStateChangeHookAdapter<F>
where
    F: FnMut(InternalState, InternalState) + 'static,
{
    fn on_state_change(&mut self, from: InternalState, to: InternalState) {
        (self.0)(from, to);
    }
}
