/// 任务对外可见的粗粒度状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Wait,
    Download,
    Finish,
    Error,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finish | Self::Error)
    }
}

/// 任务内部状态机
///
/// `Invalid → Prepare → {Download, DownloadWithoutLength} → Finish`，任意状态都可能进入 `Error`。
/// `Finish` 与 `Error` 为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalState {
    /// 刚创建，尚未发出探测会话
    Invalid,
    /// 探测会话已发出，等待首个响应确定总长度
    Prepare,
    Download,
    /// 长度未知：单会话流式下载，只累计字节数
    DownloadWithoutLength,
    Finish,
    Error,
}

impl InternalState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finish | Self::Error)
    }
}

impl From<InternalState> for TaskState {
    fn from(state: InternalState) -> Self {
        match state {
            InternalState::Invalid => TaskState::Wait,
            InternalState::Prepare
            | InternalState::Download
            | InternalState::DownloadWithoutLength => TaskState::Download,
            InternalState::Finish => TaskState::Finish,
            InternalState::Error => TaskState::Error,
        }
    }
}
