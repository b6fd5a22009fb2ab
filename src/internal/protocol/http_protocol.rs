use url::Url;

use crate::internal::protocol::traits::Protocol;
use crate::internal::transfer::structs::{
    Engine, HttpConfig, ResumeData, Task, TaskBuilder, TaskId, TransferError,
};
use crate::internal::transfer::traits::Transport;

/// 处理 `http` / `https` 地址，内部持有一个引擎。
#[derive(Debug)]
pub struct HttpProtocol {
    engine: Engine,
}

impl HttpProtocol {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            engine: Engine::new(transport),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl Protocol for HttpProtocol {
    fn name(&self) -> &str {
        "http"
    }

    fn can_process(&self, uri: &str) -> bool {
        Url::parse(uri)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false)
    }

    fn default_options(&self) -> Result<String, TransferError> {
        HttpConfig::default().to_xml()
    }

    fn add_task(&mut self, builder: TaskBuilder) -> Result<TaskId, TransferError> {
        if !self.can_process(builder.uri()) {
            return Err(TransferError::UnsupportedUri(builder.uri().to_string()));
        }
        self.engine.add_task(builder)
    }

    fn remove_task(&mut self, id: TaskId) -> Result<Task, TransferError> {
        self.engine.remove_task(id)
    }

    fn perform_download(&mut self) -> usize {
        self.engine.tick()
    }

    fn task(&self, id: TaskId) -> Option<&Task> {
        self.engine.task(id)
    }

    fn resume_data(&self, id: TaskId) -> Result<ResumeData, TransferError> {
        self.engine.resume_data(id)
    }
}
