//! 进度位图：以固定块大小记录字节区间的完成情况。
//!
//! 第 `i` 位为真，表示字节 `[i*b, min((i+1)*b, L))` 已完整写入文件。
//! 最后一块可能不足 `b` 字节，但仍然只占一位。

use std::ops::Range;

use super::transfer_error::TransferError;

/// 单个位图允许的最大位数；更大的文件需要更大的块。
pub const MAX_BITMAP_BLOCKS: u64 = 1 << 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressBitmap {
    /// 覆盖的总字节数
    length: u64,
    /// 每一位对应的字节数
    block_size: u64,
    bits: Vec<bool>,
    /// 已置位的数量，`completed_bytes` 据此 O(1) 计算
    ones: usize,
}

impl ProgressBitmap {
    /// 创建 `ceil(length / block_size)` 位、全部为假的位图。
    ///
    /// `block_size` 为 0 属于调用错误，会直接 panic。
    pub fn new(length: u64, block_size: u64) -> Self {
        assert!(block_size >= 1, "block size must be at least 1");
        let size = length.div_ceil(block_size) as usize;
        Self {
            length,
            block_size,
            bits: vec![false; size],
            ones: 0,
        }
    }

    /// `ceil(length / block_size)`；块大小为 0 或位数超过 [`MAX_BITMAP_BLOCKS`] 时返回 `None`。
    pub fn checked_blocks(length: u64, block_size: u64) -> Option<u64> {
        if block_size == 0 {
            return None;
        }
        Some(length.div_ceil(block_size)).filter(|&n| n <= MAX_BITMAP_BLOCKS)
    }

    /// 位数
    pub fn size(&self) -> usize {
        self.bits.len()
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// 从 `from` 开始查找第一个等于 `value` 的位；找不到时返回 [`size`](Self::size)。
    pub fn find(&self, value: bool, from: usize) -> usize {
        if from >= self.bits.len() {
            return self.bits.len();
        }
        self.bits[from..]
            .iter()
            .position(|&b| b == value)
            .map(|i| i + from)
            .unwrap_or(self.bits.len())
    }

    pub fn get(&self, index: usize) -> bool {
        self.bits[index]
    }

    pub fn set(&mut self, index: usize, value: bool) {
        let slot = &mut self.bits[index];
        if *slot != value {
            *slot = value;
            if value {
                self.ones += 1;
            } else {
                self.ones -= 1;
            }
        }
    }

    pub fn set_all(&mut self, value: bool) {
        self.bits.iter_mut().for_each(|b| *b = value);
        self.ones = if value { self.bits.len() } else { 0 };
    }

    /// 按位下标设置 `[range.start, range.end)`。
    pub fn set_range(&mut self, range: Range<usize>, value: bool) {
        for i in range {
            self.set(i, value);
        }
    }

    /// 按字节偏移设置：位下标取 `floor(x / b)`，`end` 达到或超过总长度时把最后的不完整块也算进去。
    pub fn set_range_by_byte_offset(&mut self, begin: u64, end: u64, value: bool) {
        let begin_bit = self.position_by_length(begin);
        let end_bit = if end >= self.length {
            self.bits.len()
        } else {
            self.position_by_length(end)
        };
        if begin_bit < end_bit {
            self.set_range(begin_bit..end_bit, value);
        }
    }

    /// 字节偏移所在的位下标。
    pub fn position_by_length(&self, byte: u64) -> usize {
        (byte / self.block_size) as usize
    }

    /// 第 `index` 位覆盖的字节区间（最后一块按真实长度截断）。
    pub fn block_range(&self, index: usize) -> Range<u64> {
        let start = index as u64 * self.block_size;
        let end = start.saturating_add(self.block_size).min(self.length);
        start..end
    }

    /// 已完成块的字节总数，最后一块按真实长度计。
    pub fn completed_bytes(&self) -> u64 {
        let Some(last) = self.bits.len().checked_sub(1) else {
            return 0;
        };
        if self.bits[last] {
            let tail = self.block_range(last);
            (self.ones as u64 - 1) * self.block_size + (tail.end - tail.start)
        } else {
            self.ones as u64 * self.block_size
        }
    }

    pub fn is_complete(&self) -> bool {
        self.ones == self.bits.len()
    }

    /// 序列化为 `'0'/'1'` 字符串，按位下标顺序。
    pub fn to_bit_string(&self) -> String {
        self.bits.iter().map(|&b| if b { '1' } else { '0' }).collect()
    }

    /// 从 `'0'/'1'` 字符串还原；长度或字符不合法时返回 `ResumeDataCorrupt`。
    pub fn from_bit_string(
        length: u64,
        block_size: u64,
        bits: &str,
    ) -> Result<Self, TransferError> {
        if block_size == 0 {
            return Err(TransferError::ResumeDataCorrupt(
                "块大小为 0".to_string(),
            ));
        }
        // 先核对长度再分配，过大的 TotalSize 不会触发分配
        let expected = length.div_ceil(block_size);
        if bits.len() as u64 != expected {
            return Err(TransferError::ResumeDataCorrupt(format!(
                "位图长度 {} 与预期 {} 不符",
                bits.len(),
                expected
            )));
        }
        let mut map = Self::new(length, block_size);
        for (i, c) in bits.bytes().enumerate() {
            match c {
                b'0' => {}
                b'1' => map.set(i, true),
                other => {
                    return Err(TransferError::ResumeDataCorrupt(format!(
                        "位图含非法字符 {:?}",
                        other as char
                    )));
                }
            }
        }
        Ok(map)
    }
}
