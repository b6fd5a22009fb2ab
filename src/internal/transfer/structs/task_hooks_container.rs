use crate::internal::transfer::structs::{InternalState, TransferError};
use crate::internal::transfer::traits::TaskHook;

/// 钩子容器：按注册顺序依次执行多个钩子。
#[derive(Default)]
pub struct TaskHooksContainer {
    hooks: Vec<Box<dyn TaskHook>>,
}

impl std::fmt::Debug for TaskHooksContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHooksContainer")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl TaskHooksContainer {
    /// 添加一个钩子；支持多次调用以注册多个钩子。
    pub fn add(&mut self, hook: impl TaskHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn run_on_log(&mut self, message: &str) {
        for h in self.hooks.iter_mut() {
            h.on_log(message);
        }
    }

    pub fn run_on_error(&mut self, error: &TransferError) {
        for h in self.hooks.iter_mut() {
            h.on_error(error);
        }
    }

    pub fn run_on_finish(&mut self) {
        for h in self.hooks.iter_mut() {
            h.on_finish();
        }
    }

    pub fn run_on_state_change(&mut self, from: InternalState, to: InternalState) {
        for h in self.hooks.iter_mut() {
            h.on_state_change(from, to);
        }
    }
}
