//! 主题设置

use crate::remote::Identity;
use crate::storage::{Slot, SlotStore, StorageResult, ThemeMode};
use crate::sync::{PushTicket, SyncEngine};

pub struct ThemeSettings {
    slots: SlotStore,
    sync: SyncEngine,
}

impl ThemeSettings {
    pub fn new(slots: SlotStore, sync: SyncEngine) -> Self {
        Self { slots, sync }
    }

    /// 未设置时为浅色
    pub fn get(&self) -> StorageResult<ThemeMode> {
        self.slots.read(Slot::Theme)
    }

    pub fn set(&self, identity: Option<&Identity>, mode: ThemeMode) -> StorageResult<PushTicket> {
        self.slots.write(Slot::Theme, &mode)?;
        Ok(self.sync.push_theme(identity, mode))
    }

    pub fn toggle(&self, identity: Option<&Identity>) -> StorageResult<(ThemeMode, PushTicket)> {
        let next = match self.get()? {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        };
        let ticket = self.set(identity, next)?;
        Ok((next, ticket))
    }
}
