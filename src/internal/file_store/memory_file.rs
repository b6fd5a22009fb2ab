//! 内存文件存储：克隆共享同一块缓冲区，可注入写入失败。

use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::internal::transfer::traits::{FileStore, OpenMode};

#[derive(Debug, Default)]
struct MemoryFileState {
    data: Vec<u8>,
    pos: u64,
    open: bool,
    path: Option<PathBuf>,
    /// 累计写入这么多字节后，后续写入全部失败
    fail_writes_after: Option<u64>,
    written: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFile {
    state: Rc<RefCell<MemoryFileState>>,
}

impl MemoryFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置内容，模拟续传时磁盘上已有的部分文件
    pub fn with_contents(data: impl Into<Vec<u8>>) -> Self {
        let file = Self::new();
        file.state.borrow_mut().data = data.into();
        file
    }

    pub fn contents(&self) -> Vec<u8> {
        self.state.borrow().data.clone()
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.state.borrow().path.clone()
    }

    pub fn fail_writes_after(&self, bytes: u64) {
        self.state.borrow_mut().fail_writes_after = Some(bytes);
    }

    fn ensure_open(state: &MemoryFileState) -> io::Result<()> {
        if state.open {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotConnected, "文件未打开"))
        }
    }
}

impl FileStore for MemoryFile {
    fn open(&mut self, path: &Path, mode: OpenMode) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if mode == OpenMode::Truncate {
            state.data.clear();
        }
        state.pos = 0;
        state.open = true;
        state.path = Some(path.to_path_buf());
        Ok(())
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        Self::ensure_open(&state)?;
        state.pos = pos;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        Self::ensure_open(&state)?;
        if state
            .fail_writes_after
            .is_some_and(|limit| state.written >= limit)
        {
            return Err(io::Error::other("写入失败（注入）"));
        }
        let start = state.pos as usize;
        let end = start + buf.len();
        if state.data.len() < end {
            state.data.resize(end, 0);
        }
        state.data[start..end].copy_from_slice(buf);
        state.pos = end as u64;
        state.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn resize(&mut self, len: u64) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        Self::ensure_open(&state)?;
        let len = usize::try_from(len).map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
        let extra = len.saturating_sub(state.data.len());
        state
            .data
            .try_reserve(extra)
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
        state.data.resize(len, 0);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.state.borrow_mut().open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.borrow().open
    }
}
