/// 任务进度：每个 tick 结束时发布到任务的响应式属性上。
///
/// 调用方通过任务的 `progress()` 读取或监听；进度比例可用 [`TaskProgress::pct`] 获取。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskProgress {
    /// 已写入文件的字节数
    pub bytes_done: u64,
    /// 文件总大小（字节），未知时为 `None`
    pub total: Option<u64>,
    /// 当前活跃会话数
    pub sessions: usize,
}

impl TaskProgress {
    /// 进度百分比（0～100）；总大小为 0 或未知时返回 `f64::NAN`。
    pub fn pct(&self) -> f64 {
        self.total
            .filter(|&t| t > 0)
            .map(|t| (self.bytes_done as f64 / t as f64) * 100.0)
            .unwrap_or(f64::NAN)
    }
}
