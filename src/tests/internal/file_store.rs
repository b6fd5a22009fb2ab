//! 文件存储：本地文件的截断/续写模式，内存文件的写入故障注入。

use std::path::Path;

use crate::file_store::{LocalFile, MemoryFile};
use crate::transfer::{FileStore, OpenMode};

#[test]
fn local_file_creates_parent_and_writes_at_offset() {
    let dir = tempfile::tempdir().expect("临时目录");
    let path = dir.path().join("nested").join("out.bin");
    let mut file = LocalFile::new();

    file.open(&path, OpenMode::Truncate).expect("打开");
    file.resize(10).expect("调整大小");
    file.seek(5).expect("定位");
    assert_eq!(file.write(b"abc").expect("写入"), 3);
    file.close().expect("关闭");
    assert!(!file.is_open());
    assert_eq!(file.path(), Some(path.as_path()));

    let contents = std::fs::read(&path).expect("读取");
    assert_eq!(contents, b"\0\0\0\0\0abc\0\0");
}

#[test]
fn local_file_resume_keeps_existing_bytes() {
    let dir = tempfile::tempdir().expect("临时目录");
    let path = dir.path().join("out.bin");
    std::fs::write(&path, b"0123456789").expect("预置内容");

    let mut file = LocalFile::new();
    file.open(&path, OpenMode::Resume).expect("打开");
    file.seek(2).expect("定位");
    file.write(b"xy").expect("写入");
    file.close().expect("关闭");
    assert_eq!(std::fs::read(&path).expect("读取"), b"01xy456789");

    file.open(&path, OpenMode::Truncate).expect("打开");
    file.close().expect("关闭");
    assert!(std::fs::read(&path).expect("读取").is_empty());
}

#[test]
fn local_file_rejects_io_when_closed() {
    let mut file = LocalFile::new();
    assert!(file.seek(0).is_err());
    assert!(file.write(b"a").is_err());
    // 未打开时关闭是空操作
    assert!(file.close().is_ok());
}

#[test]
fn memory_file_fault_injection() {
    let mut file = MemoryFile::new();
    let observer = file.clone();
    file.fail_writes_after(4);
    file.open(Path::new("/virtual/a.bin"), OpenMode::Truncate).expect("打开");

    assert_eq!(file.write(b"abcd").expect("写入"), 4);
    assert!(file.write(b"e").is_err());
    assert_eq!(observer.contents(), b"abcd");
}

#[test]
fn memory_file_rejects_unallocatable_size() {
    let mut file = MemoryFile::new();
    file.open(Path::new("/virtual/out.bin"), OpenMode::Truncate).expect("打开");
    assert!(file.resize(u64::MAX).is_err());
    assert!(file.contents().is_empty());

    file.resize(16).expect("调整大小");
    assert_eq!(file.contents().len(), 16);
}
