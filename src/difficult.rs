//! 难词账本
//!
//! 记录每个单词答错的次数，按错误次数从高到低展示。

use std::sync::Arc;

use serde::Serialize;

use crate::catalog::{Item, ItemCatalog};
use crate::clock::Clock;
use crate::remote::Identity;
use crate::storage::{DifficultRecord, Slot, SlotStore, StorageResult};
use crate::sync::{PushTicket, SyncEngine};

/// 关联了单词内容的难词
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DifficultItem {
    #[serde(flatten)]
    pub item: Item,
    pub error_count: u32,
    pub last_error_at: i64,
}

pub struct DifficultTracker {
    slots: SlotStore,
    clock: Arc<dyn Clock>,
    sync: SyncEngine,
}

impl DifficultTracker {
    pub fn new(slots: SlotStore, clock: Arc<dyn Clock>, sync: SyncEngine) -> Self {
        Self { slots, clock, sync }
    }

    /// 记录一次答错
    pub fn mark_difficult(
        &self,
        identity: Option<&Identity>,
        item_id: &str,
    ) -> StorageResult<(DifficultRecord, PushTicket)> {
        let now_ms = self.clock.now_millis();

        let record = self.slots.update(Slot::Difficult, |records: &mut Vec<DifficultRecord>| {
            match records.iter_mut().find(|r| r.item_id == item_id) {
                Some(existing) => {
                    existing.error_count += 1;
                    existing.last_error_at = now_ms;
                    existing.clone()
                }
                None => {
                    let record = DifficultRecord {
                        item_id: item_id.to_string(),
                        error_count: 1,
                        last_error_at: now_ms,
                    };
                    records.push(record.clone());
                    record
                }
            }
        })?;

        tracing::debug!(item_id = %item_id, error_count = record.error_count, "item marked difficult");

        let ticket = self.sync.push_difficult(identity, &record);
        Ok((record, ticket))
    }

    /// 移除单个难词（标记为已掌握）
    pub fn remove(&self, identity: Option<&Identity>, item_id: &str) -> StorageResult<PushTicket> {
        self.slots
            .update(Slot::Difficult, |records: &mut Vec<DifficultRecord>| {
                records.retain(|r| r.item_id != item_id);
            })?;
        Ok(self.sync.delete_difficult(identity, item_id))
    }

    pub fn clear_all(&self, identity: Option<&Identity>) -> StorageResult<PushTicket> {
        self.slots.clear(Slot::Difficult)?;
        tracing::info!(namespace = %self.slots.namespace(), "difficult list cleared");
        Ok(self.sync.clear_difficult(identity))
    }

    pub fn records(&self) -> StorageResult<Vec<DifficultRecord>> {
        self.slots.read(Slot::Difficult)
    }

    pub fn get(&self, item_id: &str) -> StorageResult<Option<DifficultRecord>> {
        Ok(self.records()?.into_iter().find(|r| r.item_id == item_id))
    }

    /// 关联目录并按错误次数降序排列
    ///
    /// 目录中已不存在的单词会被丢弃。
    pub fn list_with_detail(&self, catalog: &dyn ItemCatalog) -> StorageResult<Vec<DifficultItem>> {
        let mut detailed: Vec<DifficultItem> = self
            .records()?
            .into_iter()
            .filter_map(|record| {
                catalog.by_id(&record.item_id).map(|item| DifficultItem {
                    item,
                    error_count: record.error_count,
                    last_error_at: record.last_error_at,
                })
            })
            .collect();

        detailed.sort_by(|a, b| b.error_count.cmp(&a.error_count));
        Ok(detailed)
    }
}
