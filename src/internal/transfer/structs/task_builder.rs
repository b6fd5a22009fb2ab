use std::path::{Path, PathBuf};

use crate::internal::file_store::LocalFile;
use crate::internal::transfer::traits::{FileStore, TaskHook};

use super::hook_adapters::{
    OnErrorHookAdapter, OnFinishHookAdapter, OnLogHookAdapter, OnStateChangeHookAdapter,
};
use super::http_config::HttpConfig;
use super::resume_data::ResumeData;
use super::task_hooks_container::TaskHooksContainer;
use super::task_state::InternalState;
use super::transfer_error::TransferError;

/// 任务构建器：交给 `Engine::add_task` 后立即开始。
///
/// ```rust,no_run
/// use segfetch::transfer::TaskBuilder;
///
/// let builder = TaskBuilder::new("https://example.com/a.iso")
///     .save_to("/tmp")
///     .session_number(8)
///     .on_finish(|| println!("done"));
/// ```
pub struct TaskBuilder {
    pub(crate) uri: String,
    pub(crate) output_dir: PathBuf,
    pub(crate) output_name: Option<String>,
    pub(crate) comment: String,
    pub(crate) config: HttpConfig,
    pub(crate) resume: Option<ResumeData>,
    pub(crate) file: Box<dyn FileStore>,
    pub(crate) hooks: TaskHooksContainer,
}

impl TaskBuilder {
    /// 默认保存到系统下载目录，找不到时用当前目录。
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            output_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            output_name: None,
            comment: String::new(),
            config: HttpConfig::default(),
            resume: None,
            file: Box::new(LocalFile::new()),
            hooks: TaskHooksContainer::default(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// 设置保存目录
    pub fn save_to(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }

    /// 设置文件名；不设置时从地址推断
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.output_name = (!name.is_empty()).then_some(name);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// 整体替换配置
    pub fn config(mut self, config: HttpConfig) -> Self {
        self.config = config;
        self
    }

    /// 从 XML 文本读取配置
    pub fn options(mut self, xml: &str) -> Result<Self, TransferError> {
        self.config = HttpConfig::from_xml(xml)?;
        Ok(self)
    }

    pub fn session_number(mut self, n: usize) -> Self {
        self.config.session_number = n;
        self
    }

    pub fn min_session_blocks(mut self, m: u64) -> Self {
        self.config.min_session_blocks = m;
        self
    }

    pub fn bytes_per_block(mut self, b: u64) -> Self {
        self.config.bytes_per_block = b;
        self
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.config.referer = Some(referer.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    pub fn retry_count(mut self, n: usize) -> Self {
        self.config.retry_count = n;
        self
    }

    /// 从续传数据继续；续传数据里的拆分参数会覆盖当前配置
    pub fn resume_from(mut self, data: ResumeData) -> Self {
        self.resume = Some(data);
        self
    }

    /// 替换文件存储（默认写本地文件）
    pub fn file_store(mut self, store: impl FileStore + 'static) -> Self {
        self.file = Box::new(store);
        self
    }

    /// 注册一个完整钩子；可多次调用，按添加顺序执行。
    pub fn with_hook(mut self, hook: impl TaskHook + 'static) -> Self {
        self.hooks.add(hook);
        self
    }

    pub fn on_log<F>(mut self, f: F) -> Self
    where
        F: FnMut(&str) + 'static,
    {
        self.hooks.add(OnLogHookAdapter(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&TransferError) + 'static,
    {
        self.hooks.add(OnErrorHookAdapter(f));
        self
    }

    pub fn on_finish<F>(mut self, f: F) -> Self
    where
        F: FnMut() + 'static,
    {
        self.hooks.add(OnFinishHookAdapter(f));
        self
    }

    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: FnMut(InternalState, InternalState) + 'static,
    {
        self.hooks.add(OnStateChangeHookAdapter(f));
        self
    }
}
