//! 数据槽存储
//!
//! 每个槽位以整体 JSON 的形式保存在 `kv_slot` 表中，按命名空间隔离。
//! 读取时遇到损坏的数据会记录告警并当作空槽处理。

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::storage::{Slot, StorageError, StorageResult};

/// 绑定到单个命名空间的槽位存储
#[derive(Clone)]
pub struct SlotStore {
    conn: Arc<Mutex<Connection>>,
    namespace: String,
}

impl SlotStore {
    pub fn new(conn: Arc<Mutex<Connection>>, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// 读取整个槽位
    ///
    /// 槽位不存在或内容无法解析时返回 `T::default()`。
    pub fn read<T>(&self, slot: Slot) -> StorageResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let conn = self.get_connection()?;
        self.load(&conn, slot)
    }

    /// 整体替换槽位内容
    pub fn write<T>(&self, slot: Slot, value: &T) -> StorageResult<()>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(value)?;
        let conn = self.get_connection()?;
        self.store(&conn, slot, &payload)
    }

    /// 删除槽位，之后读取得到默认值
    pub fn clear(&self, slot: Slot) -> StorageResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "DELETE FROM kv_slot WHERE namespace = ?1 AND slot = ?2",
            params![self.namespace, slot.as_str()],
        )?;
        Ok(())
    }

    /// 读取-修改-写回
    ///
    /// 整个过程持有连接锁，并发的 `update` 不会互相覆盖。
    pub fn update<T, R, F>(&self, slot: Slot, f: F) -> StorageResult<R>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> R,
    {
        let conn = self.get_connection()?;
        let mut value: T = self.load(&conn, slot)?;
        let result = f(&mut value);
        let payload = serde_json::to_string(&value)?;
        self.store(&conn, slot, &payload)?;
        Ok(result)
    }

    /// 读取原始 JSON 文本
    pub fn read_raw(&self, slot: Slot) -> StorageResult<Option<String>> {
        let conn = self.get_connection()?;
        self.fetch(&conn, slot)
    }

    /// 写入原始 JSON 文本（不做校验）
    pub fn write_raw(&self, slot: Slot, payload: &str) -> StorageResult<()> {
        let conn = self.get_connection()?;
        self.store(&conn, slot, payload)
    }

    fn load<T>(&self, conn: &Connection, slot: Slot) -> StorageResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let Some(payload) = self.fetch(conn, slot)? else {
            return Ok(T::default());
        };

        match serde_json::from_str(&payload) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    slot = %slot,
                    error = %e,
                    "malformed slot payload, treating as empty"
                );
                Ok(T::default())
            }
        }
    }

    fn fetch(&self, conn: &Connection, slot: Slot) -> StorageResult<Option<String>> {
        let payload = conn
            .query_row(
                "SELECT payload FROM kv_slot WHERE namespace = ?1 AND slot = ?2",
                params![self.namespace, slot.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn store(&self, conn: &Connection, slot: Slot, payload: &str) -> StorageResult<()> {
        conn.execute(
            r#"
            INSERT INTO kv_slot (namespace, slot, payload, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(namespace, slot) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
            params![
                self.namespace,
                slot.as_str(),
                payload,
                Utc::now().timestamp_millis()
            ],
        )?;
        Ok(())
    }

    fn get_connection(&self) -> StorageResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DifficultRecord, ProgressMap, SrsRecord, Storage, StreakState};
    use chrono::NaiveDate;

    fn setup_slots(namespace: &str) -> (Storage, SlotStore) {
        let storage = Storage::in_memory().expect("Failed to create in-memory storage");
        let slots = storage.slots(namespace);
        (storage, slots)
    }

    #[test]
    fn test_read_missing_slot_returns_default() {
        let (_storage, slots) = setup_slots("espanol");
        let records: Vec<SrsRecord> = slots.read(Slot::Srs).unwrap();
        assert!(records.is_empty());
        let progress: ProgressMap = slots.read(Slot::Progress).unwrap();
        assert!(progress.is_empty());
    }

    #[test]
    fn test_srs_record_round_trip() {
        let (_storage, slots) = setup_slots("espanol");
        let record = SrsRecord {
            item_id: "w1".to_string(),
            next_review_at: 1_700_000_000_000,
            interval: 16,
            ease_factor: 2.36,
            repetitions: 3,
        };

        slots.write(Slot::Srs, &vec![record.clone()]).unwrap();
        let loaded: Vec<SrsRecord> = slots.read(Slot::Srs).unwrap();

        assert_eq!(loaded, vec![record]);
    }

    #[test]
    fn test_malformed_payload_is_treated_as_empty() {
        let (_storage, slots) = setup_slots("espanol");
        slots.write_raw(Slot::Difficult, "{not json").unwrap();

        let records: Vec<DifficultRecord> = slots.read(Slot::Difficult).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_wrong_shape_is_treated_as_empty() {
        let (_storage, slots) = setup_slots("espanol");
        slots.write_raw(Slot::Streak, "[1, 2, 3]").unwrap();

        let streak: StreakState = slots.read(Slot::Streak).unwrap();
        assert_eq!(streak, StreakState::default());
    }

    #[test]
    fn test_write_replaces_slot() {
        let (_storage, slots) = setup_slots("espanol");
        slots.write(Slot::Srs, &vec![SrsRecord::new("a", 0)]).unwrap();
        slots.write(Slot::Srs, &vec![SrsRecord::new("b", 0)]).unwrap();

        let loaded: Vec<SrsRecord> = slots.read(Slot::Srs).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].item_id, "b");
    }

    #[test]
    fn test_clear_slot() {
        let (_storage, slots) = setup_slots("espanol");
        slots.write(Slot::Srs, &vec![SrsRecord::new("a", 0)]).unwrap();
        slots.clear(Slot::Srs).unwrap();

        assert_eq!(slots.read_raw(Slot::Srs).unwrap(), None);
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let storage = Storage::in_memory().unwrap();
        let es = storage.slots("espanol");
        let en = storage.slots("english");

        es.write(Slot::Srs, &vec![SrsRecord::new("hola", 0)]).unwrap();

        let en_records: Vec<SrsRecord> = en.read(Slot::Srs).unwrap();
        assert!(en_records.is_empty());
        let es_records: Vec<SrsRecord> = es.read(Slot::Srs).unwrap();
        assert_eq!(es_records.len(), 1);
    }

    #[test]
    fn test_update_read_modify_write() {
        let (_storage, slots) = setup_slots("espanol");
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        let count = slots
            .update(Slot::Streak, |state: &mut StreakState| {
                state.streak_count += 1;
                state.last_activity_date = Some(date);
                state.streak_count
            })
            .unwrap();

        assert_eq!(count, 1);
        let state: StreakState = slots.read(Slot::Streak).unwrap();
        assert_eq!(state.last_activity_date, Some(date));
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let (_storage, slots) = setup_slots("espanol");
        let workers = 8;
        let rounds = 25;

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let slots = slots.clone();
                std::thread::spawn(move || {
                    for _ in 0..rounds {
                        slots
                            .update(Slot::Streak, |state: &mut StreakState| state.streak_count += 1)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let state: StreakState = slots.read(Slot::Streak).unwrap();
        assert_eq!(state.streak_count, workers * rounds);
    }
}
