//! 连续学习天数
//!
//! 每完成一课算一次活动，同一天内只计一次。

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::clock::Clock;
use crate::remote::Identity;
use crate::storage::{Slot, SlotStore, StorageResult, StreakState};
use crate::sync::{PushTicket, SyncEngine};

/// 根据上次活动日期推算今天的连续天数
///
/// 上次是昨天则加一；今天已计则不变；其余情况（含时钟回拨）重置为 1。
pub fn next_streak(state: &StreakState, today: NaiveDate) -> Option<u32> {
    match state.last_activity_date {
        Some(last) if last == today => None,
        Some(last) if today.pred_opt() == Some(last) => Some(state.streak_count + 1),
        _ => Some(1),
    }
}

pub struct StreakTracker {
    slots: SlotStore,
    clock: Arc<dyn Clock>,
    sync: SyncEngine,
}

impl StreakTracker {
    pub fn new(slots: SlotStore, clock: Arc<dyn Clock>, sync: SyncEngine) -> Self {
        Self { slots, clock, sync }
    }

    /// 记录一次学习活动
    ///
    /// 当天已经记录过时不做任何修改，也不推送。
    pub fn record_activity(&self, identity: Option<&Identity>) -> StorageResult<(StreakState, PushTicket)> {
        let today = self.clock.today();
        let (state, changed) = self.slots.update(Slot::Streak, |state: &mut StreakState| {
            let Some(count) = next_streak(state, today) else {
                return (state.clone(), false);
            };

            if count == 1 && state.streak_count > 0 {
                tracing::info!(
                    previous = state.streak_count,
                    last_activity = ?state.last_activity_date,
                    "streak reset"
                );
            }

            state.streak_count = count;
            state.last_activity_date = Some(today);
            (state.clone(), true)
        })?;

        if !changed {
            return Ok((state, PushTicket::skipped()));
        }

        let ticket = self.sync.push_streak(identity, &state);
        Ok((state, ticket))
    }

    pub fn state(&self) -> StorageResult<StreakState> {
        self.slots.read(Slot::Streak)
    }

    pub fn current(&self) -> StorageResult<u32> {
        Ok(self.state()?.streak_count)
    }

    pub fn last_sync_at(&self) -> StorageResult<Option<DateTime<Utc>>> {
        Ok(self.state()?.last_sync_at)
    }
}
