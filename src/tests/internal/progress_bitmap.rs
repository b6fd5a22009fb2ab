//! 进度位图：按字节偏移置位、完成字节数、位串编解码。

use crate::transfer::{ErrorKind, MAX_BITMAP_BLOCKS, ProgressBitmap};

#[test]
fn size_is_ceil_of_length_over_block() {
    assert_eq!(ProgressBitmap::new(2305, 10).size(), 231);
    assert_eq!(ProgressBitmap::new(2300, 10).size(), 230);
    assert_eq!(ProgressBitmap::new(0, 10).size(), 0);
}

#[test]
fn set_range_by_byte_offset_uses_floor_positions() {
    let mut map = ProgressBitmap::new(2305, 10);
    map.set_range_by_byte_offset(350, 990, true);

    assert_eq!(map.find(true, 0), 35);
    assert_eq!(map.find(false, 35), 99);
    assert!(!map.get(34));
    assert!(!map.get(99));
    assert_eq!(map.completed_bytes(), 64 * 10);
}

#[test]
fn end_at_length_includes_partial_last_block() {
    let mut map = ProgressBitmap::new(2305, 10);
    map.set_range_by_byte_offset(2300, 2305, true);
    assert!(map.get(230));
    // 最后一块只有 5 字节
    assert_eq!(map.completed_bytes(), 5);

    map.set_range_by_byte_offset(0, 2305, true);
    assert!(map.is_complete());
    assert_eq!(map.completed_bytes(), 2305);
}

#[test]
fn find_returns_size_when_absent() {
    let mut map = ProgressBitmap::new(100, 10);
    assert_eq!(map.find(true, 0), map.size());
    map.set_all(true);
    assert_eq!(map.find(false, 0), map.size());
    assert_eq!(map.find(true, 50), map.size());
}

#[test]
fn clearing_bits_updates_completed_bytes() {
    let mut map = ProgressBitmap::new(1000, 100);
    map.set_all(true);
    map.set(3, false);
    map.set_range(7..9, false);
    assert_eq!(map.completed_bytes(), 700);
    assert!(!map.is_complete());
    assert_eq!(map.block_range(9), 900..1000);
}

#[test]
fn bit_string_restores_same_map() {
    let mut map = ProgressBitmap::new(2305, 10);
    map.set_range_by_byte_offset(350, 990, true);
    map.set(230, true);

    let text = map.to_bit_string();
    assert_eq!(text.len(), 231);
    assert!(text.starts_with(&"0".repeat(35)));

    let restored = ProgressBitmap::from_bit_string(2305, 10, &text).expect("解析位串");
    assert_eq!(restored, map);
    assert_eq!(restored.completed_bytes(), 645);
}

#[test]
fn bad_bit_strings_are_corrupt() {
    let short = ProgressBitmap::from_bit_string(1000, 100, "0101").unwrap_err();
    assert_eq!(short.kind(), ErrorKind::ResumeDataCorrupt);

    let bad_char = ProgressBitmap::from_bit_string(300, 100, "01x").unwrap_err();
    assert_eq!(bad_char.kind(), ErrorKind::ResumeDataCorrupt);

    let zero_block = ProgressBitmap::from_bit_string(300, 0, "").unwrap_err();
    assert_eq!(zero_block.kind(), ErrorKind::ResumeDataCorrupt);
}

#[test]
fn oversized_length_is_rejected_before_allocation() {
    let err = ProgressBitmap::from_bit_string(u64::MAX, 1, "0101").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResumeDataCorrupt);

    assert_eq!(ProgressBitmap::checked_blocks(u64::MAX, 1), None);
    assert_eq!(ProgressBitmap::checked_blocks(1000, 0), None);
    assert_eq!(ProgressBitmap::checked_blocks(2305, 10), Some(231));
    assert_eq!(
        ProgressBitmap::checked_blocks(MAX_BITMAP_BLOCKS * 4, 4),
        Some(MAX_BITMAP_BLOCKS)
    );
    assert_eq!(ProgressBitmap::checked_blocks(MAX_BITMAP_BLOCKS * 4 + 1, 4), None);
}

#[test]
fn huge_block_size_covers_whole_length_in_one_bit() {
    let mut map = ProgressBitmap::new(1000, u64::MAX);
    assert_eq!(map.size(), 1);
    assert_eq!(map.block_range(0), 0..1000);
    map.set_range_by_byte_offset(0, 1000, true);
    assert_eq!(map.completed_bytes(), 1000);
}

#[test]
fn full_range_sets_every_bit() {
    let mut map = ProgressBitmap::new(3000, 13);
    assert_eq!(map.size(), 231);
    map.set_range_by_byte_offset(0, 3000, true);
    assert!(map.is_complete());
    assert_eq!(map.find(false, 0), 231);
    assert_eq!(map.completed_bytes(), 3000);
}

#[test]
fn random_marks_survive_bit_string_and_count_marked_bytes() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let length = rng.gen_range(1..5000u64);
        let block = rng.gen_range(1..300u64);
        let mut map = ProgressBitmap::new(length, block);
        for _ in 0..rng.gen_range(0..6) {
            let begin = rng.gen_range(0..length);
            let end = rng.gen_range(begin..=length);
            map.set_range_by_byte_offset(begin, end, true);
        }

        let restored =
            ProgressBitmap::from_bit_string(length, block, &map.to_bit_string()).expect("解析");
        assert_eq!(restored, map);

        let marked: u64 = (0..map.size())
            .filter(|&i| map.get(i))
            .map(|i| map.block_range(i).end - map.block_range(i).start)
            .sum();
        assert_eq!(restored.completed_bytes(), marked);
    }
}
