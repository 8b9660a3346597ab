//! 学习核心
//!
//! 每种教学语言一个实例，由语言配置决定存储命名空间。界面层只与本模块交互：
//! 所有写操作先同步写入本地，再在后台尽力镜像到云端。

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::catalog::{Item, ItemCatalog};
use crate::clock::Clock;
use crate::difficult::{DifficultItem, DifficultTracker};
use crate::profile::LanguageProfile;
use crate::progress::ProgressTracker;
use crate::remote::{Identity, RemoteStore};
use crate::settings::ThemeSettings;
use crate::srs::{SrsScheduler, NEW_ITEMS_PER_SESSION};
use crate::storage::{
    DifficultRecord, LessonProgress, ProgressMap, SrsRecord, Storage, StorageResult, StreakState,
    ThemeMode,
};
use crate::streak::StreakTracker;
use crate::sync::{PullReport, PushTicket, SyncEngine};

/// 答对时的记忆质量
pub const CORRECT_QUALITY: i32 = 5;
/// 答错时的记忆质量
pub const WRONG_QUALITY: i32 = 1;

/// 测验答题结果
#[derive(Debug)]
pub struct QuizAnswer {
    pub srs: SrsRecord,
    /// 答错时更新后的难词记录
    pub difficult: Option<DifficultRecord>,
    pub pushes: Vec<PushTicket>,
}

/// 完成一课的结果
#[derive(Debug)]
pub struct LessonCompletion {
    pub progress: LessonProgress,
    pub streak: StreakState,
    pub pushes: Vec<PushTicket>,
}

pub struct LearningCore {
    profile: LanguageProfile,
    identity: Option<Identity>,
    sync: SyncEngine,
    srs: SrsScheduler,
    difficult: DifficultTracker,
    streak: StreakTracker,
    progress: ProgressTracker,
    settings: ThemeSettings,
}

impl LearningCore {
    /// 创建语言实例；`remote` 为 `None` 时只使用本地存储
    pub fn new(
        profile: LanguageProfile,
        storage: &Storage,
        remote: Option<Arc<dyn RemoteStore>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let slots = storage.slots(&profile.namespace);
        let sync = match remote {
            Some(remote) => SyncEngine::new(remote, profile.code.as_str(), slots.clone(), clock.clone()),
            None => SyncEngine::offline(slots.clone(), clock.clone()),
        };

        Self {
            srs: SrsScheduler::new(slots.clone(), clock.clone(), sync.clone()),
            difficult: DifficultTracker::new(slots.clone(), clock.clone(), sync.clone()),
            streak: StreakTracker::new(slots.clone(), clock, sync.clone()),
            progress: ProgressTracker::new(slots.clone(), sync.clone()),
            settings: ThemeSettings::new(slots, sync.clone()),
            profile,
            identity: None,
            sync,
        }
    }

    pub fn profile(&self) -> &LanguageProfile {
        &self.profile
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_online(&self) -> bool {
        self.sync.is_online()
    }

    // ========== 会话 ==========

    /// 开始会话：记录身份并拉取云端数据覆盖本地
    ///
    /// 拉取在本次会话的任何推送之前完成。
    pub async fn start_session(&mut self, identity: Option<Identity>) -> PullReport {
        self.identity = identity;
        let report = self.sync.pull_all(self.identity.as_ref()).await;

        let failed = report.failed_kinds();
        if !failed.is_empty() {
            tracing::warn!(
                language = %self.profile.code,
                failed = ?failed,
                "session started with partially stale local state"
            );
        }
        report
    }

    /// 退出登录，之后只写本地
    pub fn end_session(&mut self) {
        self.identity = None;
    }

    // ========== 复习 ==========

    pub fn review(&self, item_id: &str, quality: i32) -> StorageResult<(SrsRecord, PushTicket)> {
        self.srs.update(self.identity.as_ref(), item_id, quality)
    }

    /// 测验答题：答对按质量 5 复习；答错记入难词并按质量 1 复习
    pub fn record_quiz_answer(&self, item_id: &str, correct: bool) -> StorageResult<QuizAnswer> {
        let mut pushes = Vec::new();

        let difficult = if correct {
            None
        } else {
            let (record, ticket) = self.difficult.mark_difficult(self.identity.as_ref(), item_id)?;
            pushes.push(ticket);
            Some(record)
        };

        let quality = if correct { CORRECT_QUALITY } else { WRONG_QUALITY };
        let (srs, ticket) = self.review(item_id, quality)?;
        pushes.push(ticket);

        Ok(QuizAnswer {
            srs,
            difficult,
            pushes,
        })
    }

    pub fn due_count(&self) -> StorageResult<usize> {
        self.srs.due_count()
    }

    pub fn due_item_ids(&self) -> StorageResult<BTreeSet<String>> {
        self.srs.due_item_ids()
    }

    /// 目录中已到期的单词
    pub fn items_for_review(&self, catalog: &dyn ItemCatalog) -> StorageResult<Vec<Item>> {
        let all = catalog.all();
        Ok(self.srs.due_items(&all)?.into_iter().cloned().collect())
    }

    /// 复习队列：有到期单词时返回到期单词，否则引入一批新单词
    pub fn review_queue(&self, catalog: &dyn ItemCatalog) -> StorageResult<Vec<Item>> {
        let all = catalog.all();
        let due = self.srs.due_items(&all)?;
        if !due.is_empty() {
            return Ok(due.into_iter().cloned().collect());
        }
        Ok(self
            .srs
            .introduce_new(&all, NEW_ITEMS_PER_SESSION)?
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn reset_reviews(&self) -> StorageResult<PushTicket> {
        self.srs.reset_all(self.identity.as_ref())
    }

    // ========== 难词 ==========

    pub fn mark_difficult(&self, item_id: &str) -> StorageResult<(DifficultRecord, PushTicket)> {
        self.difficult.mark_difficult(self.identity.as_ref(), item_id)
    }

    pub fn remove_difficult(&self, item_id: &str) -> StorageResult<PushTicket> {
        self.difficult.remove(self.identity.as_ref(), item_id)
    }

    pub fn clear_difficult(&self) -> StorageResult<PushTicket> {
        self.difficult.clear_all(self.identity.as_ref())
    }

    pub fn difficult_items(&self, catalog: &dyn ItemCatalog) -> StorageResult<Vec<DifficultItem>> {
        self.difficult.list_with_detail(catalog)
    }

    // ========== 课程 ==========

    /// 保存课程成绩并记一次学习活动
    pub fn complete_lesson(
        &self,
        category: &str,
        lesson_index: usize,
        score: u32,
        total: u32,
    ) -> StorageResult<LessonCompletion> {
        let (progress, progress_push) =
            self.progress
                .save_lesson(self.identity.as_ref(), category, lesson_index, score, total)?;
        let (streak, streak_push) = self.streak.record_activity(self.identity.as_ref())?;

        Ok(LessonCompletion {
            progress,
            streak,
            pushes: vec![progress_push, streak_push],
        })
    }

    pub fn lesson_progress(&self, category: &str, lesson_index: usize) -> StorageResult<Option<LessonProgress>> {
        self.progress.get(category, lesson_index)
    }

    pub fn all_progress(&self) -> StorageResult<ProgressMap> {
        self.progress.all()
    }

    pub fn reset_progress(&self) -> StorageResult<PushTicket> {
        self.progress.reset(self.identity.as_ref())
    }

    // ========== 设置与打卡 ==========

    pub fn theme(&self) -> StorageResult<ThemeMode> {
        self.settings.get()
    }

    pub fn set_theme(&self, mode: ThemeMode) -> StorageResult<PushTicket> {
        self.settings.set(self.identity.as_ref(), mode)
    }

    pub fn streak(&self) -> StorageResult<u32> {
        self.streak.current()
    }

    pub fn last_sync_at(&self) -> StorageResult<Option<DateTime<Utc>>> {
        self.streak.last_sync_at()
    }

    // ========== 组件访问 ==========

    pub fn scheduler(&self) -> &SrsScheduler {
        &self.srs
    }

    pub fn difficult_tracker(&self) -> &DifficultTracker {
        &self.difficult
    }

    pub fn streak_tracker(&self) -> &StreakTracker {
        &self.streak
    }

    pub fn progress_tracker(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn sync_engine(&self) -> &SyncEngine {
        &self.sync
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::clock::ManualClock;

    fn offline_core(storage: &Storage, profile: LanguageProfile) -> LearningCore {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::from_millis(1_700_000_000_000));
        LearningCore::new(profile, storage, None, clock)
    }

    #[test]
    fn test_quiz_answer_wrong_marks_difficult() {
        let storage = Storage::in_memory().unwrap();
        let core = offline_core(&storage, LanguageProfile::spanish());

        let answer = core.record_quiz_answer("w1", false).unwrap();

        assert_eq!(answer.difficult.unwrap().error_count, 1);
        assert_eq!(answer.srs.repetitions, 0);
        assert_eq!(answer.pushes.len(), 2);
        assert!(answer.pushes.iter().all(PushTicket::is_skipped));
    }

    #[test]
    fn test_quiz_answer_correct_advances_srs() {
        let storage = Storage::in_memory().unwrap();
        let core = offline_core(&storage, LanguageProfile::spanish());

        let answer = core.record_quiz_answer("w1", true).unwrap();

        assert!(answer.difficult.is_none());
        assert_eq!(answer.srs.repetitions, 1);
    }

    #[test]
    fn test_complete_lesson_counts_activity_once_per_day() {
        let storage = Storage::in_memory().unwrap();
        let core = offline_core(&storage, LanguageProfile::spanish());

        let first = core.complete_lesson("food", 0, 8, 10).unwrap();
        let second = core.complete_lesson("food", 1, 10, 10).unwrap();

        assert_eq!(first.streak.streak_count, 1);
        assert_eq!(second.streak.streak_count, 1);
        assert_eq!(core.all_progress().unwrap().len(), 2);
    }

    #[test]
    fn test_language_instances_are_isolated() {
        let storage = Storage::in_memory().unwrap();
        let es = offline_core(&storage, LanguageProfile::spanish());
        let en = offline_core(&storage, LanguageProfile::english());

        es.mark_difficult("hola").unwrap();
        es.set_theme(ThemeMode::Dark).unwrap();

        assert!(en.difficult_tracker().records().unwrap().is_empty());
        assert_eq!(en.theme().unwrap(), ThemeMode::Light);
        assert_eq!(es.theme().unwrap(), ThemeMode::Dark);
    }

    #[test]
    fn test_review_queue_introduces_new_items_when_nothing_due() {
        let storage = Storage::in_memory().unwrap();
        let core = offline_core(&storage, LanguageProfile::spanish());
        let catalog = StaticCatalog::new(
            (0..15)
                .map(|i| Item::new(format!("w{i}"), "t", "r", "numbers"))
                .collect(),
        );

        let first = core.review_queue(&catalog).unwrap();
        assert_eq!(first.len(), NEW_ITEMS_PER_SESSION);
        assert_eq!(first[0].id, "w0");

        // 新引入的单词立即到期，再次取队列时返回同一批
        let second = core.review_queue(&catalog).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn test_items_for_review_uses_catalog() {
        let storage = Storage::in_memory().unwrap();
        let core = offline_core(&storage, LanguageProfile::spanish());
        let catalog = StaticCatalog::new(vec![
            Item::new("w1", "uno", "один", "numbers"),
            Item::new("w2", "dos", "два", "numbers"),
        ]);

        // 新建记录的到期时间是 now + 1 天，这里直接写入一条已到期记录
        core.scheduler().update(None, "w2", 1).unwrap();
        assert!(core.items_for_review(&catalog).unwrap().is_empty());

        storage
            .slots("espanol")
            .write(crate::storage::Slot::Srs, &vec![SrsRecord::new("w2", 0)])
            .unwrap();
        let due = core.items_for_review(&catalog).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "w2");
    }
}
