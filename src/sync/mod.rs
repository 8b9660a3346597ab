//! 同步引擎模块
//!
//! 负责本地数据与云端镜像的对账：
//! - 会话开始时拉取云端数据并按实体类型覆盖本地（云端视为权威）
//! - 每次本地修改后尽力推送一次（不排队、不重试），失败只记录日志
//!
//! 远端行按 (身份, 语言) 归属，不同语言实例共用同一远端时互不影响。
//! 没有身份或没有远端时，所有操作都是空操作。

pub mod rows;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::remote::{EntityKind, Identity, RemoteResult, RemoteScope, RemoteStore};
use crate::storage::{
    DifficultRecord, LessonProgress, ProgressMap, Slot, SlotStore, SrsRecord, StorageResult,
    StreakState, ThemeMode,
};

// ============================================================
// 推送结果
// ============================================================

/// 单次推送的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// 没有身份、没有远端或没有异步运行时
    Skipped,
    Delivered,
    Failed(String),
}

/// 推送凭据
///
/// 推送在后台执行；调用方可以等待结果，也可以直接丢弃凭据。
#[derive(Debug)]
pub struct PushTicket {
    handle: Option<JoinHandle<PushOutcome>>,
}

impl PushTicket {
    pub fn skipped() -> Self {
        Self { handle: None }
    }

    pub fn is_skipped(&self) -> bool {
        self.handle.is_none()
    }

    /// 等待推送完成
    pub async fn outcome(self) -> PushOutcome {
        match self.handle {
            None => PushOutcome::Skipped,
            Some(handle) => handle
                .await
                .unwrap_or_else(|e| PushOutcome::Failed(format!("push task aborted: {e}"))),
        }
    }
}

// ============================================================
// 拉取结果
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullStatus {
    /// 已用云端数据覆盖本地，附带应用的行数
    Applied(usize),
    /// 拉取失败，本地数据保持不变
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone, Default)]
pub struct PullReport {
    pub results: BTreeMap<EntityKind, PullStatus>,
}

impl PullReport {
    fn skipped() -> Self {
        Self {
            results: EntityKind::ALL
                .iter()
                .map(|kind| (*kind, PullStatus::Skipped))
                .collect(),
        }
    }

    pub fn status(&self, kind: EntityKind) -> &PullStatus {
        self.results.get(&kind).unwrap_or(&PullStatus::Skipped)
    }

    pub fn all_applied(&self) -> bool {
        EntityKind::ALL
            .iter()
            .all(|kind| matches!(self.status(*kind), PullStatus::Applied(_)))
    }

    pub fn failed_kinds(&self) -> Vec<EntityKind> {
        self.results
            .iter()
            .filter(|(_, status)| matches!(status, PullStatus::Failed(_)))
            .map(|(kind, _)| *kind)
            .collect()
    }
}

// ============================================================
// SyncEngine
// ============================================================

/// 同步引擎
///
/// 绑定一个本地命名空间和一种远端语言；身份由每次调用显式传入。
#[derive(Clone)]
pub struct SyncEngine {
    remote: Option<Arc<dyn RemoteStore>>,
    language: String,
    slots: SlotStore,
    clock: Arc<dyn Clock>,
}

impl SyncEngine {
    /// `language` 是远端行的语言列，通常为语言代码
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        language: impl Into<String>,
        slots: SlotStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            remote: Some(remote),
            language: language.into(),
            slots,
            clock,
        }
    }

    /// 纯本地模式，所有推送都被跳过
    pub fn offline(slots: SlotStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            remote: None,
            language: String::new(),
            slots,
            clock,
        }
    }

    pub fn is_online(&self) -> bool {
        self.remote.is_some()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn scope(&self, identity: &Identity) -> RemoteScope {
        RemoteScope::new(identity.clone(), self.language.as_str())
    }

    // ========== 拉取 ==========

    /// 拉取云端数据并覆盖本地
    ///
    /// 四类实体并发拉取，互不影响；某类拉取失败时该类本地数据保持不变。
    pub async fn pull_all(&self, identity: Option<&Identity>) -> PullReport {
        let (Some(remote), Some(identity)) = (self.remote.as_ref(), identity) else {
            return PullReport::skipped();
        };

        let scope = self.scope(identity);
        tracing::info!(scope = %scope, namespace = %self.slots.namespace(), "pulling remote state");

        let (progress, difficult, srs, settings) = futures::join!(
            remote.fetch_all(&scope, EntityKind::Progress),
            remote.fetch_all(&scope, EntityKind::Difficult),
            remote.fetch_all(&scope, EntityKind::Srs),
            remote.fetch_all(&scope, EntityKind::Settings),
        );

        let mut report = PullReport::default();
        report.results.insert(
            EntityKind::Progress,
            self.apply_pulled(EntityKind::Progress, progress, |rows| self.apply_progress(rows)),
        );
        report.results.insert(
            EntityKind::Difficult,
            self.apply_pulled(EntityKind::Difficult, difficult, |rows| self.apply_difficult(rows)),
        );
        report.results.insert(
            EntityKind::Srs,
            self.apply_pulled(EntityKind::Srs, srs, |rows| self.apply_srs(rows)),
        );
        report.results.insert(
            EntityKind::Settings,
            self.apply_pulled(EntityKind::Settings, settings, |rows| self.apply_settings(rows)),
        );

        report
    }

    fn apply_pulled<F>(&self, kind: EntityKind, fetched: RemoteResult<Vec<Value>>, apply: F) -> PullStatus
    where
        F: FnOnce(Vec<Value>) -> StorageResult<usize>,
    {
        let rows = match fetched {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "remote fetch failed, keeping local state");
                return PullStatus::Failed(e.to_string());
            }
        };

        match apply(rows) {
            Ok(applied) => {
                tracing::debug!(kind = %kind, rows = applied, "remote state applied");
                PullStatus::Applied(applied)
            }
            Err(e) => {
                tracing::error!(kind = %kind, error = %e, "failed to write pulled state locally");
                PullStatus::Failed(e.to_string())
            }
        }
    }

    fn apply_progress(&self, rows: Vec<Value>) -> StorageResult<usize> {
        let progress: ProgressMap = decode_rows(EntityKind::Progress, rows, rows::decode_progress)
            .into_iter()
            .map(|p| (p.lesson_id.clone(), p))
            .collect();
        self.slots.write(Slot::Progress, &progress)?;
        Ok(progress.len())
    }

    fn apply_difficult(&self, rows: Vec<Value>) -> StorageResult<usize> {
        let records = decode_rows(EntityKind::Difficult, rows, rows::decode_difficult);
        self.slots.write(Slot::Difficult, &records)?;
        Ok(records.len())
    }

    fn apply_srs(&self, rows: Vec<Value>) -> StorageResult<usize> {
        let records = decode_rows(EntityKind::Srs, rows, rows::decode_srs);
        self.slots.write(Slot::Srs, &records)?;
        Ok(records.len())
    }

    /// 设置行只覆盖远端给出的字段；没有设置行时本地保持不变
    fn apply_settings(&self, rows: Vec<Value>) -> StorageResult<usize> {
        let Some(patch) = decode_rows(EntityKind::Settings, rows, rows::decode_settings)
            .into_iter()
            .next()
        else {
            return Ok(0);
        };

        if let Some(theme) = patch.theme {
            self.slots.write(Slot::Theme, &theme)?;
        }
        if patch.touches_streak() {
            self.slots
                .update(Slot::Streak, |state: &mut StreakState| patch.apply_to_streak(state))?;
        }
        Ok(1)
    }

    // ========== 推送 ==========

    pub fn push_srs(&self, identity: Option<&Identity>, record: &SrsRecord) -> PushTicket {
        let record = record.clone();
        let now = self.clock.now();
        self.dispatch(identity, EntityKind::Srs, &record.item_id.clone(), move |remote, scope| async move {
            let row = rows::srs_row(&scope, &record, now);
            remote
                .upsert(&scope, EntityKind::Srs, &record.item_id, row)
                .await
        })
    }

    /// 删除该身份的全部 SRS 行
    pub fn clear_srs(&self, identity: Option<&Identity>) -> PushTicket {
        self.dispatch(identity, EntityKind::Srs, "*", |remote, scope| async move {
            remote.delete_all(&scope, EntityKind::Srs).await
        })
    }

    pub fn push_difficult(&self, identity: Option<&Identity>, record: &DifficultRecord) -> PushTicket {
        let record = record.clone();
        self.dispatch(identity, EntityKind::Difficult, &record.item_id.clone(), move |remote, scope| async move {
            let row = rows::difficult_row(&scope, &record);
            remote
                .upsert(&scope, EntityKind::Difficult, &record.item_id, row)
                .await
        })
    }

    pub fn delete_difficult(&self, identity: Option<&Identity>, item_id: &str) -> PushTicket {
        let item_id = item_id.to_string();
        self.dispatch(identity, EntityKind::Difficult, &item_id.clone(), move |remote, scope| async move {
            remote
                .delete(&scope, EntityKind::Difficult, &item_id)
                .await
        })
    }

    pub fn clear_difficult(&self, identity: Option<&Identity>) -> PushTicket {
        self.dispatch(identity, EntityKind::Difficult, "*", |remote, scope| async move {
            remote.delete_all(&scope, EntityKind::Difficult).await
        })
    }

    pub fn push_progress(&self, identity: Option<&Identity>, progress: &LessonProgress) -> PushTicket {
        let progress = progress.clone();
        let now = self.clock.now();
        self.dispatch(identity, EntityKind::Progress, &progress.lesson_id.clone(), move |remote, scope| async move {
            let row = rows::progress_row(&scope, &progress, now);
            remote
                .upsert(&scope, EntityKind::Progress, &progress.lesson_id, row)
                .await
        })
    }

    pub fn clear_progress(&self, identity: Option<&Identity>) -> PushTicket {
        self.dispatch(identity, EntityKind::Progress, "*", |remote, scope| async move {
            remote.delete_all(&scope, EntityKind::Progress).await
        })
    }

    pub fn push_theme(&self, identity: Option<&Identity>, theme: ThemeMode) -> PushTicket {
        let now = self.clock.now();
        self.dispatch(identity, EntityKind::Settings, "theme", move |remote, scope| async move {
            let row = rows::theme_row(&scope, theme, now);
            remote
                .upsert(&scope, EntityKind::Settings, "", row)
                .await
        })
    }

    /// 推送连续打卡；成功后在本地记录同步时间
    pub fn push_streak(&self, identity: Option<&Identity>, state: &StreakState) -> PushTicket {
        let state = state.clone();
        let now = self.clock.now();
        let slots = self.slots.clone();
        self.dispatch(identity, EntityKind::Settings, "streak", move |remote, scope| async move {
            let row = rows::streak_row(&scope, &state, now);
            remote
                .upsert(&scope, EntityKind::Settings, "", row)
                .await?;

            if let Err(e) = slots.update(Slot::Streak, |local: &mut StreakState| {
                local.last_sync_at = Some(now);
            }) {
                tracing::warn!(error = %e, "failed to stamp streak sync time");
            }
            Ok(())
        })
    }

    /// 在后台执行一次推送
    fn dispatch<F, Fut>(&self, identity: Option<&Identity>, kind: EntityKind, key: &str, op: F) -> PushTicket
    where
        F: FnOnce(Arc<dyn RemoteStore>, RemoteScope) -> Fut,
        Fut: Future<Output = RemoteResult<()>> + Send + 'static,
    {
        let (Some(remote), Some(identity)) = (self.remote.as_ref(), identity) else {
            return PushTicket::skipped();
        };

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(kind = %kind, key = %key, "no async runtime, remote mirror dropped");
            return PushTicket::skipped();
        };

        let task = op(Arc::clone(remote), self.scope(identity));
        let key = key.to_string();
        let handle = runtime.spawn(async move {
            match task.await {
                Ok(()) => {
                    tracing::debug!(kind = %kind, key = %key, "remote mirror delivered");
                    PushOutcome::Delivered
                }
                Err(e) => {
                    tracing::warn!(kind = %kind, key = %key, error = %e, "remote mirror failed, local state kept");
                    PushOutcome::Failed(e.to_string())
                }
            }
        });

        PushTicket {
            handle: Some(handle),
        }
    }
}

/// 解码远端行，跳过无法解析的行
fn decode_rows<T, F>(kind: EntityKind, rows: Vec<Value>, decode: F) -> Vec<T>
where
    F: Fn(Value) -> RemoteResult<T>,
{
    rows.into_iter()
        .filter_map(|row| match decode(row) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "skipping malformed remote row");
                None
            }
        })
        .collect()
}
