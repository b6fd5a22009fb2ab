//! 文件存储接口：单个输出文件上的定位、写入与调整大小。

use std::io;
use std::path::Path;

/// 打开方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// 新任务：创建或清空
    Truncate,
    /// 续传：保留已有内容
    Resume,
}

pub trait FileStore {
    fn open(&mut self, path: &Path, mode: OpenMode) -> io::Result<()>;

    fn seek(&mut self, pos: u64) -> io::Result<()>;

    /// 在当前位置写入，返回实际写入的字节数
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn resize(&mut self, len: u64) -> io::Result<()>;

    fn close(&mut self) -> io::Result<()>;

    fn is_open(&self) -> bool;
}
