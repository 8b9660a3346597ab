//! SQLite 离线存储模块
//!
//! 本地存储是每个设备上的唯一数据所有者，提供：
//! - 按语言命名空间隔离的五个数据槽（进度、难词、SRS、主题、连续打卡）
//! - 版本化的 schema 迁移
//! - 损坏数据的本地恢复（视为空槽）

// ============================================================
// 子模块声明
// ============================================================

pub mod migrations;
pub mod models;
pub mod slots;

// ============================================================
// 重新导出主要类型
// ============================================================

pub use migrations::run_migrations;
pub use models::*;
pub use slots::SlotStore;

// ============================================================
// 依赖导入
// ============================================================

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

// ============================================================
// 错误类型定义
// ============================================================

/// 存储模块错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("数据库错误: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("迁移错误: {0}")]
    Migration(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("参数无效: {0}")]
    InvalidInput(String),

    #[error("锁获取失败: {0}")]
    LockError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================
// Storage - 统一存储结构体
// ============================================================

/// 统一存储结构体
///
/// 持有共享的 SQLite 连接。多个语言实例可以共用同一个 `Storage`，
/// 通过 [`Storage::slots`] 获取各自命名空间下的槽位存储。
#[derive(Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

impl Storage {
    /// 打开（或创建）数据库文件
    ///
    /// 自动启用 WAL 模式并运行数据库迁移。
    pub fn open<P: AsRef<Path>>(db_path: P) -> StorageResult<Self> {
        let path_str = db_path.as_ref().to_string_lossy().to_string();
        let connection = Connection::open(&db_path)?;

        // 启用 WAL 模式以提高并发性能
        connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;",
        )?;

        Self::from_connection(connection, path_str)
    }

    /// 创建内存数据库（用于测试）
    pub fn in_memory() -> StorageResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::from_connection(connection, ":memory:".to_string())
    }

    fn from_connection(connection: Connection, db_path: String) -> StorageResult<Self> {
        migrations::run_migrations(&connection)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(connection)),
            db_path,
        })
    }

    /// 获取数据库路径
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// 获取指定命名空间下的槽位存储
    pub fn slots(&self, namespace: &str) -> SlotStore {
        SlotStore::new(Arc::clone(&self.conn), namespace)
    }

    /// 列出数据库中已有数据的命名空间
    pub fn namespaces(&self) -> StorageResult<Vec<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))?;

        let mut stmt = conn.prepare("SELECT DISTINCT namespace FROM kv_slot ORDER BY namespace")?;
        let namespaces = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(namespaces)
    }
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_in_memory() {
        let storage = Storage::in_memory().expect("Failed to create in-memory storage");
        assert_eq!(storage.db_path(), ":memory:");
        assert!(storage.namespaces().unwrap().is_empty());
    }

    #[test]
    fn test_namespaces_are_listed_after_write() {
        let storage = Storage::in_memory().unwrap();
        storage
            .slots("espanol")
            .write(Slot::Theme, &ThemeMode::Dark)
            .unwrap();
        storage
            .slots("english")
            .write(Slot::Theme, &ThemeMode::Light)
            .unwrap();

        assert_eq!(storage.namespaces().unwrap(), vec!["english", "espanol"]);
    }

    #[test]
    fn test_open_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core.db");

        {
            let storage = Storage::open(&path).unwrap();
            storage
                .slots("espanol")
                .write(Slot::Theme, &ThemeMode::Dark)
                .unwrap();
        }

        let reopened = Storage::open(&path).unwrap();
        let theme: ThemeMode = reopened.slots("espanol").read(Slot::Theme).unwrap();
        assert_eq!(theme, ThemeMode::Dark);
    }
}
