//! 下载管理器：按地址分派、暂停恢复、快照保存与载入。写入真实的临时目录。

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use crate::protocol::{AddTaskParams, DownloadManager, HttpProtocol, ManagerTaskId};
use crate::tests::{MAX_TICKS, TEST_URI, pattern_body};
use crate::transfer::{TaskState, TransferError};
use crate::transport::{MemoryResource, MemoryTransport};

const OPTIONS: &str = "<HttpConfig><SessionNumber>4</SessionNumber><BytesPerBlock>100</BytesPerBlock></HttpConfig>";

fn manager_with(body: &[u8]) -> (DownloadManager, MemoryTransport) {
    let transport = MemoryTransport::new();
    transport.add_resource(TEST_URI, MemoryResource::new(body.to_vec()));
    let manager = DownloadManager::new().with_protocol(HttpProtocol::new(transport.clone()));
    (manager, transport)
}

fn params(dir: &Path) -> AddTaskParams {
    AddTaskParams {
        uri: TEST_URI.to_string(),
        output_dir: dir.to_path_buf(),
        output_name: Some("out.bin".to_string()),
        options: Some(OPTIONS.to_string()),
        comment: "nightly mirror".to_string(),
    }
}

fn run_to_idle(manager: &mut DownloadManager) {
    for _ in 0..MAX_TICKS {
        if manager.perform() == 0 {
            return;
        }
    }
    panic!("管理器没有在 {MAX_TICKS} 个 tick 内空闲");
}

#[test]
fn dispatches_by_scheme() {
    let (manager, _transport) = manager_with(b"x");
    assert!(manager.can_download("http://mirror.test/a.bin"));
    assert!(manager.can_download("https://mirror.test/a.bin"));
    assert!(!manager.can_download("ftp://mirror.test/a.bin"));
    assert!(!manager.can_download("not a uri"));

    let options = manager.task_options(TEST_URI).expect("默认配置");
    assert!(options.contains("<SessionNumber>5</SessionNumber>"));
    assert!(matches!(
        manager.task_options("ftp://mirror.test/a.bin"),
        Err(TransferError::UnsupportedUri(_))
    ));
}

#[test]
fn added_task_waits_until_started() {
    let dir = tempfile::tempdir().expect("临时目录");
    let body = pattern_body(1000);
    let (mut manager, transport) = manager_with(&body);
    let seen: Rc<RefCell<Vec<(ManagerTaskId, TaskState)>>> = Rc::default();
    let seen_clone = seen.clone();
    manager.on_state_change(move |id, state| seen_clone.borrow_mut().push((id, state)));

    let id = manager.add_task(params(dir.path())).expect("添加任务");
    assert_eq!(manager.state(id), Some(TaskState::Wait));
    assert!(transport.opened_requests().is_empty());

    manager.start_task(id).expect("启动任务");
    run_to_idle(&mut manager);

    assert_eq!(manager.state(id), Some(TaskState::Finish));
    let record = manager.record(id).expect("记录");
    assert_eq!(record.total_size, 1000);
    assert_eq!(record.downloaded, 1000);
    assert!(record.resume.is_none());
    assert_eq!(std::fs::read(dir.path().join("out.bin")).expect("读取"), body);
    assert_eq!(
        *seen.borrow(),
        vec![(id, TaskState::Download), (id, TaskState::Finish)]
    );

    let err = manager.start_task(id).unwrap_err();
    assert!(matches!(err, TransferError::InvalidTaskState(_)));
}

#[test]
fn stop_and_start_resumes_from_bitmap() {
    let dir = tempfile::tempdir().expect("临时目录");
    let body = pattern_body(1000);
    let (mut manager, transport) = manager_with(&body);
    let id = manager.add_task(params(dir.path())).expect("添加任务");

    manager.start_task(id).expect("启动任务");
    for _ in 0..3 {
        manager.perform();
    }
    manager.stop_task(id).expect("停止任务");

    assert_eq!(manager.state(id), Some(TaskState::Wait));
    let resume = manager.resume_data(id).expect("续传数据");
    assert_eq!(resume.total_size, 1000);
    assert!(resume.bitmap.starts_with('1'));
    assert_eq!(transport.in_flight(), 0);
    let first_run = transport.opened_requests().len();

    manager.start_task(id).expect("再次启动");
    run_to_idle(&mut manager);

    assert_eq!(manager.state(id), Some(TaskState::Finish));
    assert_eq!(std::fs::read(dir.path().join("out.bin")).expect("读取"), body);
    let resumed = &transport.opened_requests()[first_run..];
    assert!(resumed.iter().all(|r| r.start >= 100));
}

#[test]
fn snapshot_round_trip_restores_waiting_tasks() {
    let dir = tempfile::tempdir().expect("临时目录");
    let body = pattern_body(1000);
    let (mut manager, transport) = manager_with(&body);
    let id = manager.add_task(params(dir.path())).expect("添加任务");
    manager.start_task(id).expect("启动任务");
    for _ in 0..3 {
        manager.perform();
    }

    // 运行中保存：带上当前位图
    let xml = manager.save().expect("保存");
    assert!(xml.starts_with("<DownloadManager>"));
    manager.stop_task(id).expect("停止任务");

    let mut restored = DownloadManager::new().with_protocol(HttpProtocol::new(transport.clone()));
    restored.load(&xml).expect("载入");
    assert_eq!(restored.state(id), Some(TaskState::Wait));
    let record = restored.record(id).expect("记录");
    assert_eq!(record.comment, "nightly mirror");
    assert_eq!(record.output_name.as_deref(), Some("out.bin"));
    assert_eq!(record.options.session_number, 4);
    assert_eq!(record.resume, manager.record(id).and_then(|r| r.resume.clone()));

    restored.start_task(id).expect("启动任务");
    run_to_idle(&mut restored);
    assert_eq!(restored.state(id), Some(TaskState::Finish));
    assert_eq!(std::fs::read(dir.path().join("out.bin")).expect("读取"), body);
}

#[test]
fn unsupported_and_unknown_tasks_are_rejected() {
    let dir = tempfile::tempdir().expect("临时目录");
    let (mut manager, _transport) = manager_with(b"x");

    let mut bad = params(dir.path());
    bad.uri = "ftp://mirror.test/a.bin".to_string();
    assert!(matches!(
        manager.add_task(bad),
        Err(TransferError::UnsupportedUri(_))
    ));
    assert_eq!(manager.start_task(9).unwrap_err(), TransferError::TaskNotFound(9));

    let id = manager.add_task(params(dir.path())).expect("添加任务");
    let record = manager.remove_task(id).expect("删除任务");
    assert_eq!(record.uri, TEST_URI);
    assert_eq!(manager.state(id), None);
    assert_eq!(manager.records().count(), 0);
}
