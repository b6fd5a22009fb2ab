//! 会话拆分：初始拆分、拆分最大会话、查找未覆盖的缺口。
//!
//! 所有拆分点都落在块边界上；并列时取起点最小者，保证结果可复现。

use std::ops::Range;

use crate::internal::transfer::structs::TransferError;
use crate::internal::transfer::structs::session::SessionId;
use crate::internal::transfer::traits::Transport;

use super::Task;

impl Task {
    /// 初始化后执行一次，目标是凑满 `session_number` 个会话：
    /// 1. 每个后续的未完成区间各开一个会话；
    /// 2. 仍不足时，把最大的会话按块均分；
    /// 3. 最后用拆分最大会话补齐。
    pub(super) fn initial_split(&mut self, transport: &mut dyn Transport) -> Result<(), TransferError> {
        let target = self.config.session_number;
        let Some(map) = self.download_map.as_ref() else {
            return Ok(());
        };
        let b = map.block_size();
        let total = map.length();

        let mut cursor = self
            .sessions
            .values()
            .filter_map(|s| s.end())
            .max()
            .map(|end| end.div_ceil(b) as usize)
            .unwrap_or(0);
        let mut runs = Vec::new();
        while self.sessions.len() + runs.len() < target {
            let start = map.find(false, cursor);
            if start >= map.size() {
                break;
            }
            let end = map.find(true, start);
            runs.push(start as u64 * b..(end as u64).saturating_mul(b).min(total));
            cursor = end;
        }
        for run in runs {
            self.open_session(transport, run.start, Some(run.end - run.start))?;
        }

        if self.sessions.len() < target {
            self.divide_largest(transport, target - self.sessions.len() + 1)?;
        }
        while self.sessions.len() < target && self.split_largest(transport)? {}
        Ok(())
    }

    /// 剩余最多的会话；并列取起点最小者。
    fn largest_session(&self) -> Option<(SessionId, u64, u64)> {
        let mut best: Option<(SessionId, u64, u64)> = None;
        for s in self.sessions.values() {
            let Some(rem) = s.remaining() else { continue };
            let better = match best {
                None => true,
                Some((_, pos, r)) => rem > r || (rem == r && s.pos() < pos),
            };
            if better {
                best = Some((s.id(), s.pos(), rem));
            }
        }
        best
    }

    /// 把最大的会话按块均分为至多 `parts` 份，每份不少于 `min_session_blocks * b` 字节；
    /// 余数落在最后一份。凑不出两份合格的分段时不拆分。
    fn divide_largest(&mut self, transport: &mut dyn Transport, parts: usize) -> Result<(), TransferError> {
        if self.single_session {
            return Ok(());
        }
        let Some((sid, pos, rem)) = self.largest_session() else {
            return Ok(());
        };
        let b = self.config.bytes_per_block;
        let min_len = self.config.min_session_blocks.saturating_mul(b);
        let end = pos + rem;
        // 起点所在的不完整块归第一份
        let blocks = end.div_ceil(b) - pos / b;
        let most = (parts as u64).min(rem / min_len).min(blocks);

        let Some(cuts) = (2..=most)
            .rev()
            .map(|n| Self::block_cuts(pos, end, b, blocks, n))
            .find(|cuts| cuts.windows(2).all(|w| w[1].saturating_sub(w[0]) >= min_len))
        else {
            return Ok(());
        };

        if let Some(session) = self.sessions.get_mut(&sid) {
            session.bound_to(cuts[1]);
        }
        for pair in cuts[1..].windows(2) {
            self.open_session(transport, pair[0], Some(pair[1] - pair[0]))?;
        }
        self.log(format!("会话 {sid} 均分为 {} 份", cuts.len() - 1));
        Ok(())
    }

    /// `[pos, end)` 按块数均分为 `parts` 份的边界，首尾分别是 `pos` 与 `end`。
    fn block_cuts(pos: u64, end: u64, b: u64, blocks: u64, parts: u64) -> Vec<u64> {
        let mut cuts = Vec::with_capacity(parts as usize + 1);
        cuts.push(pos);
        let mut block_cursor = pos / b;
        let mut left = blocks;
        for i in 0..parts - 1 {
            let take = left / (parts - i);
            block_cursor += take;
            left -= take;
            cuts.push(block_cursor * b);
        }
        cuts.push(end);
        cuts
    }

    /// 在最靠近中点的块边界处把最大会话一分为二。
    ///
    /// 剩余不足 `2 * M * b` 时拒绝并返回 `false`，拒绝不是错误。
    pub(crate) fn split_largest(&mut self, transport: &mut dyn Transport) -> Result<bool, TransferError> {
        if self.single_session {
            return Ok(false);
        }
        let Some((sid, pos, rem)) = self.largest_session() else {
            return Ok(false);
        };
        let b = self.config.bytes_per_block;
        let m = self.config.min_session_blocks;
        if rem < m.saturating_mul(b).saturating_mul(2) {
            return Ok(false);
        }

        let end = pos + rem;
        let mid = pos + rem / 2;
        let lowest = (pos / b + 1) * b;
        let highest = ((end - 1) / b) * b;
        let cut = (((mid + b / 2) / b) * b).clamp(lowest, highest);

        if let Some(session) = self.sessions.get_mut(&sid) {
            session.bound_to(cut);
        }
        let new_id = self.open_session(transport, cut, Some(end - cut))?;
        self.log(format!("拆分会话 {sid}: [{pos}, {cut}) + 会话 {new_id} [{cut}, {end})"));
        Ok(true)
    }

    /// 第一个既未完成、又不在任何会话认领块内的区间（字节），从左到右首次匹配。
    pub(super) fn first_uncovered_gap(&self) -> Option<Range<u64>> {
        let map = self.download_map.as_ref()?;
        let b = map.block_size();
        let mut spans: Vec<Range<usize>> = self
            .sessions
            .values()
            .map(|s| s.block_span(b))
            .filter(|span| !span.is_empty())
            .collect();
        spans.sort_by_key(|s| s.start);

        let mut bit = map.find(false, 0);
        while bit < map.size() {
            if let Some(span) = spans.iter().find(|s| s.contains(&bit)) {
                bit = map.find(false, span.end);
                continue;
            }
            let mut end = map.find(true, bit);
            if let Some(next) = spans.iter().map(|s| s.start).find(|&start| start > bit) {
                end = end.min(next);
            }
            let range = map.block_range(bit);
            let last = map.block_range(end - 1);
            return Some(range.start..last.end);
        }
        None
    }
}
