//! 进程内远端存储
//!
//! 用于离线演示和测试：行按 (实体类型, 归属, 自然键) 保存，upsert 合并列，
//! 并支持按实体类型注入故障。

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{EntityKind, RemoteError, RemoteResult, RemoteScope, RemoteStore};

type RowKey = (EntityKind, RemoteScope, String);

#[derive(Default)]
struct Inner {
    rows: BTreeMap<RowKey, Value>,
    failing: HashSet<EntityKind>,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct MemoryRemoteStore {
    inner: Mutex<Inner>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让该实体类型上的所有调用失败
    pub fn fail_kind(&self, kind: EntityKind) {
        self.with_inner(|inner| {
            inner.failing.insert(kind);
        });
    }

    pub fn restore_kind(&self, kind: EntityKind) {
        self.with_inner(|inner| {
            inner.failing.remove(&kind);
        });
    }

    /// 直接写入一行，绕过故障注入
    pub fn seed(&self, scope: &RemoteScope, kind: EntityKind, natural_key: &str, row: Value) {
        self.with_inner(|inner| {
            inner
                .rows
                .insert((kind, scope.clone(), storage_key(kind, natural_key)), row);
        });
    }

    pub fn row(&self, scope: &RemoteScope, kind: EntityKind, natural_key: &str) -> Option<Value> {
        self.with_inner(|inner| {
            inner
                .rows
                .get(&(kind, scope.clone(), storage_key(kind, natural_key)))
                .cloned()
        })
    }

    pub fn rows(&self, scope: &RemoteScope, kind: EntityKind) -> Vec<Value> {
        self.with_inner(|inner| collect_rows(inner, scope, kind))
    }

    /// 已收到的调用记录，如 `upsert:srs:w1`
    pub fn calls(&self) -> Vec<String> {
        self.with_inner(|inner| inner.calls.clone())
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn begin(&self, op: &str, kind: EntityKind, key: &str) -> RemoteResult<()> {
        self.with_inner(|inner| {
            inner.calls.push(format!("{op}:{kind}:{key}"));
            if inner.failing.contains(&kind) {
                Err(RemoteError::Unavailable(format!("{} is failing", kind.table())))
            } else {
                Ok(())
            }
        })
    }
}

fn collect_rows(inner: &Inner, scope: &RemoteScope, kind: EntityKind) -> Vec<Value> {
    inner
        .rows
        .iter()
        .filter(|((k, owner, _), _)| *k == kind && owner == scope)
        .map(|(_, row)| row.clone())
        .collect()
}

fn storage_key(kind: EntityKind, natural_key: &str) -> String {
    match kind {
        EntityKind::Settings => String::new(),
        _ => natural_key.to_string(),
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch_all(&self, scope: &RemoteScope, kind: EntityKind) -> RemoteResult<Vec<Value>> {
        self.begin("fetch", kind, "*")?;
        Ok(self.rows(scope, kind))
    }

    async fn upsert(
        &self,
        scope: &RemoteScope,
        kind: EntityKind,
        natural_key: &str,
        row: Value,
    ) -> RemoteResult<()> {
        self.begin("upsert", kind, natural_key)?;
        let key = (kind, scope.clone(), storage_key(kind, natural_key));

        self.with_inner(|inner| {
            if let (Some(Value::Object(existing)), Value::Object(incoming)) =
                (inner.rows.get_mut(&key), &row)
            {
                existing.extend(incoming.clone());
                return;
            }
            inner.rows.insert(key, row);
        });
        Ok(())
    }

    async fn delete(&self, scope: &RemoteScope, kind: EntityKind, natural_key: &str) -> RemoteResult<()> {
        self.begin("delete", kind, natural_key)?;
        let key = (kind, scope.clone(), storage_key(kind, natural_key));
        self.with_inner(|inner| {
            inner.rows.remove(&key);
        });
        Ok(())
    }

    async fn delete_all(&self, scope: &RemoteScope, kind: EntityKind) -> RemoteResult<()> {
        self.begin("delete", kind, "*")?;
        self.with_inner(|inner| {
            inner
                .rows
                .retain(|(k, owner, _), _| !(*k == kind && owner == scope));
        });
        Ok(())
    }
}
