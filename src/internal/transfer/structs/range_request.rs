//! 单段 Range 请求的描述，由会话交给传输层发起。

/// 发起 Range 请求时的参数（形参超过 3 个时用 struct 承载）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    pub uri: String,
    /// 起始字节
    pub start: u64,
    /// 请求长度；`None` 只出现在长度未知的探测会话上
    pub length: Option<u64>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

impl RangeRequest {
    /// 生成 Range 请求头：
    /// - 已知长度：`bytes=start-(end-1)`，end 为不含上界；
    /// - 未知长度：`bytes=start-`；从 0 开始时不带 Range 头。
    pub fn range_header(&self) -> Option<String> {
        match self.length {
            Some(len) => {
                let end_inclusive = (self.start + len).saturating_sub(1);
                Some(format!("bytes={}-{}", self.start, end_inclusive))
            }
            None if self.start == 0 => None,
            None => Some(format!("bytes={}-", self.start)),
        }
    }

    /// 不含上界的结束位置；长度未知时为 `None`。
    pub fn end(&self) -> Option<u64> {
        self.length.map(|len| self.start + len)
    }
}
