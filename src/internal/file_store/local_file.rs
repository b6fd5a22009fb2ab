//! 本地文件存储，基于 `std::fs`。

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::internal::transfer::traits::{FileStore, OpenMode};

#[derive(Debug, Default)]
pub struct LocalFile {
    file: Option<File>,
    path: Option<PathBuf>,
}

impl LocalFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn handle(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "文件未打开"))
    }
}

impl FileStore for LocalFile {
    fn open(&mut self, path: &Path, mode: OpenMode) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(mode == OpenMode::Truncate)
            .open(path)?;
        self.file = Some(file);
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.handle()?.seek(SeekFrom::Start(pos)).map(|_| ())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.handle()?.write(buf)
    }

    fn resize(&mut self, len: u64) -> io::Result<()> {
        self.handle()?.set_len(len)
    }

    fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(mut file) => {
                file.flush()?;
                file.sync_all()
            }
            None => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }
}
