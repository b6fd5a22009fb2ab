//! 响应式属性：读写、watch 监听、销毁通知，以及任务进度的发布。

use std::time::Duration;

use crate::file_store::MemoryFile;
use crate::states::unlock_reactive::UnlockReactiveProperty;
use crate::tests::{MAX_TICKS, memory_builder, memory_engine, pattern_body};
use crate::transfer::TaskProgress;
use crate::transport::MemoryResource;

#[tokio::test]
async fn basic_update_and_read() {
    let prop = UnlockReactiveProperty::new(0u64);
    prop.update(42);
    assert_eq!(prop.get_current(), Some(42));

    prop.update(50).update(51);
    assert_eq!(prop.get_current(), Some(51));
}

#[tokio::test]
async fn watch_receives_updates() {
    let prop = UnlockReactiveProperty::new(0i32);
    let mut watcher = prop.watch();

    prop.update(1);
    assert_eq!(watcher.changed().await.expect("变化"), 1);

    prop.update(2);
    assert_eq!(watcher.changed().await.expect("变化"), 2);
    assert_eq!(watcher.borrow(), Some(2));
}

#[tokio::test]
async fn watcher_is_woken_from_another_task() {
    let prop = UnlockReactiveProperty::new(0u32);
    let mut watcher = prop.watch();
    let writer = prop.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        writer.update(7);
    });

    let value = tokio::time::timeout(Duration::from_secs(2), watcher.changed())
        .await
        .expect("超时")
        .expect("变化");
    assert_eq!(value, 7);
}

#[tokio::test]
async fn wait_until_returns_first_matching_value() {
    let prop = UnlockReactiveProperty::new(5u64);
    let mut watcher = prop.watch();
    // 当前值已满足
    assert_eq!(watcher.wait_until(|v| *v >= 5).await.expect("等待"), 5);

    let writer = prop.clone();
    tokio::spawn(async move {
        for v in [6, 8, 10, 12] {
            tokio::time::sleep(Duration::from_millis(5)).await;
            writer.update(v);
        }
    });
    let value = tokio::time::timeout(Duration::from_secs(2), watcher.wait_until(|v| *v >= 10))
        .await
        .expect("超时")
        .expect("等待");
    assert!(value >= 10);
}

#[tokio::test]
async fn wait_until_fails_once_property_is_gone() {
    let prop = UnlockReactiveProperty::new(0u8);
    let mut watcher = prop.watch();
    drop(prop);
    assert!(watcher.wait_until(|v| *v > 0).await.is_err());
}

#[tokio::test]
async fn dropping_last_handle_wakes_watchers() {
    let prop = UnlockReactiveProperty::new(String::from("a"));
    let mut watcher = prop.watch();
    drop(prop);

    assert!(watcher.changed().await.is_err());
}

#[test]
fn task_progress_is_published_each_tick() {
    let (mut engine, _transport) = memory_engine(MemoryResource::new(pattern_body(1000)));
    let file = MemoryFile::new();
    let id = engine.add_task(memory_builder(&file)).expect("添加任务");
    let progress = engine.task(id).map(|t| t.progress()).expect("任务存在");

    assert_eq!(
        progress.get_current(),
        Some(TaskProgress {
            bytes_done: 0,
            total: None,
            sessions: 1,
        })
    );
    assert!(progress.get_current().is_some_and(|p| p.pct().is_nan()));

    engine.tick();
    let after_init = progress.get_current().expect("进度");
    assert_eq!(after_init.total, Some(1000));
    assert_eq!(after_init.sessions, 5);

    let mut last = 0;
    for _ in 0..MAX_TICKS {
        let active = engine.tick();
        let current = progress.get_current().expect("进度").bytes_done;
        assert!(current >= last, "进度回退: {last} -> {current}");
        last = current;
        if active == 0 {
            break;
        }
    }
    assert_eq!(last, 1000);
}
