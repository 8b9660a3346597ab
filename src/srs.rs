//! SM-2 间隔重复调度
//!
//! 记忆质量 `quality` 取 1..=5：
//! - `< 3` 视为遗忘，连续次数清零、间隔回到 1 天
//! - `>= 3` 视为记住，间隔按 1 → 6 → round(interval * EF) 增长
//!
//! 难度系数每次都会重新计算，下限为 1.3。

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::catalog::Item;
use crate::clock::Clock;
use crate::remote::Identity;
use crate::storage::{SlotStore, Slot, SrsRecord, StorageResult, DAY_MS, MIN_EASE_FACTOR};
use crate::sync::{PushTicket, SyncEngine};

/// 记住/遗忘的分界
pub const PASSING_QUALITY: i32 = 3;

/// 没有到期单词时，一次最多引入的新单词数
pub const NEW_ITEMS_PER_SESSION: usize = 10;

/// 根据一次复习结果计算新的记录
///
/// 记住时的新间隔使用更新前的难度系数。`quality` 不做范围校验，
/// 越界值直接代入公式。
pub fn sm2_step(record: &SrsRecord, quality: i32, now_ms: i64) -> SrsRecord {
    let mut next = record.clone();

    if quality < PASSING_QUALITY {
        next.repetitions = 0;
        next.interval = 1;
    } else {
        next.interval = match record.repetitions {
            0 => 1,
            1 => 6,
            _ => ((record.interval as f64) * record.ease_factor).round().max(1.0) as u32,
        };
        next.repetitions = record.repetitions + 1;
    }

    let q = (5 - quality) as f64;
    next.ease_factor = (record.ease_factor + (0.1 - q * (0.08 + q * 0.02))).max(MIN_EASE_FACTOR);
    next.next_review_at = now_ms + next.interval as i64 * DAY_MS;

    next
}

/// 复习调度器
pub struct SrsScheduler {
    slots: SlotStore,
    clock: Arc<dyn Clock>,
    sync: SyncEngine,
}

impl SrsScheduler {
    pub fn new(slots: SlotStore, clock: Arc<dyn Clock>, sync: SyncEngine) -> Self {
        Self { slots, clock, sync }
    }

    /// 记录一次复习，没有记录时按默认值新建
    pub fn update(
        &self,
        identity: Option<&Identity>,
        item_id: &str,
        quality: i32,
    ) -> StorageResult<(SrsRecord, PushTicket)> {
        let now_ms = self.clock.now_millis();
        let mut records = self.all()?;

        let index = match records.iter().position(|r| r.item_id == item_id) {
            Some(index) => index,
            None => {
                records.push(SrsRecord::new(item_id, now_ms));
                records.len() - 1
            }
        };

        let updated = sm2_step(&records[index], quality, now_ms);
        records[index] = updated.clone();
        self.slots.write(Slot::Srs, &records)?;

        tracing::debug!(
            item_id = %item_id,
            quality,
            interval = updated.interval,
            repetitions = updated.repetitions,
            ease_factor = updated.ease_factor,
            "srs record updated"
        );

        let ticket = self.sync.push_srs(identity, &updated);
        Ok((updated, ticket))
    }

    pub fn record(&self, item_id: &str) -> StorageResult<Option<SrsRecord>> {
        Ok(self.all()?.into_iter().find(|r| r.item_id == item_id))
    }

    pub fn all(&self) -> StorageResult<Vec<SrsRecord>> {
        self.slots.read(Slot::Srs)
    }

    /// 已到期的单词 ID
    pub fn due_item_ids(&self) -> StorageResult<BTreeSet<String>> {
        let now_ms = self.clock.now_millis();
        Ok(self
            .all()?
            .into_iter()
            .filter(|r| r.is_due(now_ms))
            .map(|r| r.item_id)
            .collect())
    }

    /// 从给定单词中筛出到期的，保持原有顺序
    pub fn due_items<'a>(&self, items: &'a [Item]) -> StorageResult<Vec<&'a Item>> {
        let due = self.due_item_ids()?;
        Ok(items.iter().filter(|item| due.contains(&item.id)).collect())
    }

    pub fn due_count(&self) -> StorageResult<usize> {
        let now_ms = self.clock.now_millis();
        Ok(self.all()?.iter().filter(|r| r.is_due(now_ms)).count())
    }

    /// 为尚无记录的单词建立初始记录（立即到期），最多 `limit` 个
    ///
    /// 只写本地，不推送；第一次复习时才会镜像到云端。
    pub fn introduce_new<'a>(&self, items: &'a [Item], limit: usize) -> StorageResult<Vec<&'a Item>> {
        let now_ms = self.clock.now_millis();
        let mut records = self.all()?;

        let fresh: Vec<&Item> = items
            .iter()
            .filter(|item| !records.iter().any(|r| r.item_id == item.id))
            .take(limit)
            .collect();

        if fresh.is_empty() {
            return Ok(fresh);
        }

        records.extend(fresh.iter().map(|item| SrsRecord::new(item.id.as_str(), now_ms)));
        self.slots.write(Slot::Srs, &records)?;

        tracing::debug!(count = fresh.len(), "new items introduced");
        Ok(fresh)
    }

    /// 清空全部复习记录
    pub fn reset_all(&self, identity: Option<&Identity>) -> StorageResult<PushTicket> {
        self.slots.clear(Slot::Srs)?;
        tracing::info!(namespace = %self.slots.namespace(), "srs records reset");
        Ok(self.sync.clear_srs(identity))
    }
}
