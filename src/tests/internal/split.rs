//! 拆分算法：初始拆分、拆分最大会话的拒绝边界与拆分点。

use crate::file_store::MemoryFile;
use crate::tests::{
    MAX_TICKS, TEST_URI, assert_disjoint, memory_builder, open_task, pattern_body, pump,
};
use crate::transfer::{InternalState, Task, TaskState};
use crate::transport::{MemoryResource, MemoryTransport};

fn transport_with(len: usize) -> MemoryTransport {
    let transport = MemoryTransport::new();
    transport.add_resource(TEST_URI, MemoryResource::new(pattern_body(len)));
    transport
}

/// 推进到任务结束（完成或出错）。
fn pump_to_end(task: &mut Task, transport: &mut MemoryTransport) {
    for _ in 0..MAX_TICKS {
        if matches!(task.state(), TaskState::Finish | TaskState::Error) {
            return;
        }
        pump(task, transport);
    }
    panic!("任务未在 {MAX_TICKS} 个 tick 内结束");
}

#[test]
fn initial_split_partitions_into_equal_block_runs() {
    let mut transport = transport_with(1000);
    let file = MemoryFile::new();
    let mut task = open_task(memory_builder(&file), &mut transport);
    assert_eq!(task.internal_state(), InternalState::Prepare);
    assert_eq!(task.session_count(), 1);

    // 第一个 tick 交付探测响应，初始化同步完成
    pump(&mut task, &mut transport);

    assert_eq!(task.internal_state(), InternalState::Download);
    assert_eq!(
        task.session_ranges(),
        vec![0..200, 200..400, 400..600, 600..800, 800..1000]
    );
    assert_eq!(task.total_size(), 1000);
    assert_eq!(file.contents().len(), 1000);

    let requests = transport.opened_requests();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[0].range_header(), None);
    assert_eq!(requests[1].range_header().as_deref(), Some("bytes=200-399"));
    assert_eq!(requests[4].range_header().as_deref(), Some("bytes=800-999"));
}

#[test]
fn initial_split_respects_min_blocks() {
    let mut transport = transport_with(1000);
    let file = MemoryFile::new();
    // 10 块、每个会话至少 4 块：最多两份
    let builder = memory_builder(&file).min_session_blocks(4);
    let mut task = open_task(builder, &mut transport);
    pump(&mut task, &mut transport);

    let ranges = task.session_ranges();
    assert_eq!(ranges, vec![0..500, 500..1000]);
}

#[test]
fn split_largest_refuses_below_two_min_sessions() {
    let mut transport = transport_with(199);
    let file = MemoryFile::new();
    let builder = memory_builder(&file).session_number(1);
    let mut task = open_task(builder, &mut transport);
    pump(&mut task, &mut transport);
    assert_eq!(task.session_ranges(), vec![0..199]);

    // 199 < 2 * 1 * 100
    assert!(!task.split_largest(&mut transport).expect("拆分"));
    assert_eq!(task.session_count(), 1);
}

#[test]
fn split_largest_accepts_exactly_two_min_sessions() {
    let mut transport = transport_with(200);
    let file = MemoryFile::new();
    let builder = memory_builder(&file).session_number(1);
    let mut task = open_task(builder, &mut transport);
    pump(&mut task, &mut transport);

    assert!(task.split_largest(&mut transport).expect("拆分"));
    assert_eq!(task.session_ranges(), vec![0..100, 100..200]);

    // 两个会话都只剩 100 字节，不能再拆
    assert!(!task.split_largest(&mut transport).expect("拆分"));
}

#[test]
fn split_largest_cuts_near_midpoint_and_prefers_lowest_start() {
    let mut transport = transport_with(1000);
    let file = MemoryFile::new();
    let builder = memory_builder(&file).session_number(1);
    let mut task = open_task(builder, &mut transport);
    pump(&mut task, &mut transport);

    assert!(task.split_largest(&mut transport).expect("拆分"));
    assert_eq!(task.session_ranges(), vec![0..500, 500..1000]);

    // 两段剩余相同，取起点较小者；中点 250 舍入到块边界 300
    assert!(task.split_largest(&mut transport).expect("拆分"));
    let ranges = task.session_ranges();
    assert_eq!(ranges, vec![0..300, 300..500, 500..1000]);
    assert_disjoint(&ranges);
}

#[test]
fn split_points_stay_on_block_boundaries_while_downloading() {
    let mut transport = transport_with(1000);
    transport.set_chunk_size(30);
    let file = MemoryFile::new();
    let builder = memory_builder(&file).session_number(1);
    let mut task = open_task(builder, &mut transport);
    pump(&mut task, &mut transport);
    // 探测会话写到 90 字节，游标不在块边界上
    for _ in 0..3 {
        pump(&mut task, &mut transport);
    }
    assert_eq!(task.session_ranges(), vec![90..1000]);

    assert!(task.split_largest(&mut transport).expect("拆分"));
    let ranges = task.session_ranges();
    assert_eq!(ranges.len(), 2);
    assert_eq!(ranges[0].start, 90);
    assert_eq!(ranges[1].start % 100, 0);
    assert_eq!(ranges[0].end, ranges[1].start);
    assert_eq!(ranges[1].end, 1000);
}

#[test]
fn initial_split_never_leaves_partial_tail_below_min_length() {
    // 350 字节、每个会话至少 200 字节：分两份时尾部只有 150，不拆分
    let mut transport = transport_with(350);
    let file = MemoryFile::new();
    let builder = memory_builder(&file).session_number(2).min_session_blocks(2);
    let mut task = open_task(builder, &mut transport);
    pump(&mut task, &mut transport);

    assert_eq!(task.session_ranges(), vec![0..350]);
    assert!(!task.split_largest(&mut transport).expect("拆分"));

    pump_to_end(&mut task, &mut transport);
    assert_eq!(task.state(), TaskState::Finish);
    assert_eq!(file.contents(), pattern_body(350));
}

#[test]
fn initial_split_with_partial_tail_gives_every_session_min_length() {
    let mut transport = transport_with(350);
    let file = MemoryFile::new();
    let mut task = open_task(memory_builder(&file), &mut transport);
    pump(&mut task, &mut transport);

    let ranges = task.session_ranges();
    assert_eq!(ranges, vec![0..100, 100..200, 200..350]);
    assert!(ranges.iter().all(|r| r.end - r.start >= 100));
    assert_disjoint(&ranges);
}

#[test]
fn huge_min_blocks_refuse_to_split_without_overflow() {
    let mut transport = transport_with(1000);
    let file = MemoryFile::new();
    let builder = memory_builder(&file).min_session_blocks(u64::MAX / 2);
    let mut task = open_task(builder, &mut transport);
    pump(&mut task, &mut transport);

    assert_eq!(task.session_ranges(), vec![0..1000]);
    assert!(!task.split_largest(&mut transport).expect("拆分"));

    pump_to_end(&mut task, &mut transport);
    assert_eq!(task.state(), TaskState::Finish);
    assert_eq!(file.contents(), pattern_body(1000));
}

#[test]
fn huge_block_size_uses_one_block() {
    let mut transport = transport_with(1000);
    let file = MemoryFile::new();
    let builder = memory_builder(&file).bytes_per_block(u64::MAX - 1);
    let mut task = open_task(builder, &mut transport);
    pump(&mut task, &mut transport);

    assert_eq!(task.download_bitmap().map(|m| m.size()), Some(1));
    assert_eq!(task.session_ranges(), vec![0..1000]);

    pump_to_end(&mut task, &mut transport);
    assert_eq!(task.state(), TaskState::Finish);
    assert_eq!(task.downloaded(), 1000);
    assert_eq!(file.contents(), pattern_body(1000));
}
