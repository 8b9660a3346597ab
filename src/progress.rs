//! 课程进度
//!
//! 测验阶段结束时保存成绩，同一课程重复完成时覆盖旧成绩。

use crate::remote::Identity;
use crate::storage::{LessonProgress, ProgressMap, Slot, SlotStore, StorageError, StorageResult};
use crate::sync::{PushTicket, SyncEngine};

pub struct ProgressTracker {
    slots: SlotStore,
    sync: SyncEngine,
}

impl ProgressTracker {
    pub fn new(slots: SlotStore, sync: SyncEngine) -> Self {
        Self { slots, sync }
    }

    /// 保存课程成绩，`score` 不能大于 `total`
    pub fn save_lesson(
        &self,
        identity: Option<&Identity>,
        category: &str,
        lesson_index: usize,
        score: u32,
        total: u32,
    ) -> StorageResult<(LessonProgress, PushTicket)> {
        if score > total {
            return Err(StorageError::InvalidInput(format!(
                "score {} exceeds total {}",
                score, total
            )));
        }

        let lesson_id = LessonProgress::lesson_id(category, lesson_index);
        let progress = LessonProgress {
            lesson_id: lesson_id.clone(),
            completed: true,
            score,
            total,
        };

        self.slots.update(Slot::Progress, |map: &mut ProgressMap| {
            map.insert(lesson_id, progress.clone());
        })?;

        tracing::debug!(lesson_id = %progress.lesson_id, score, total, "lesson progress saved");

        let ticket = self.sync.push_progress(identity, &progress);
        Ok((progress, ticket))
    }

    pub fn get(&self, category: &str, lesson_index: usize) -> StorageResult<Option<LessonProgress>> {
        let lesson_id = LessonProgress::lesson_id(category, lesson_index);
        Ok(self.all()?.remove(&lesson_id))
    }

    pub fn all(&self) -> StorageResult<ProgressMap> {
        self.slots.read(Slot::Progress)
    }

    /// 分类下已完成的课程数
    ///
    /// 分类名本身可能带 `-`，只按最后一段序号拆分。
    pub fn completed_in_category(&self, category: &str) -> StorageResult<usize> {
        Ok(self
            .all()?
            .values()
            .filter(|p| p.completed && lesson_category(&p.lesson_id) == Some(category))
            .count())
    }

    /// 清空全部课程进度
    pub fn reset(&self, identity: Option<&Identity>) -> StorageResult<PushTicket> {
        self.slots.clear(Slot::Progress)?;
        tracing::info!(namespace = %self.slots.namespace(), "lesson progress reset");
        Ok(self.sync.clear_progress(identity))
    }
}

/// 从 `{category}-{index}` 中取出分类名
fn lesson_category(lesson_id: &str) -> Option<&str> {
    let (category, index) = lesson_id.rsplit_once('-')?;
    index.parse::<usize>().ok().map(|_| category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::storage::Storage;
    use std::sync::Arc;

    fn setup() -> ProgressTracker {
        let storage = Storage::in_memory().unwrap();
        let slots = storage.slots("espanol");
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::from_millis(0));
        let sync = SyncEngine::offline(slots.clone(), clock);
        ProgressTracker::new(slots, sync)
    }

    #[test]
    fn test_save_and_get_lesson() {
        let tracker = setup();
        tracker.save_lesson(None, "food", 2, 7, 10).unwrap();

        let progress = tracker.get("food", 2).unwrap().unwrap();
        assert_eq!(progress.lesson_id, "food-2");
        assert!(progress.completed);
        assert_eq!((progress.score, progress.total), (7, 10));
        assert_eq!(tracker.get("food", 3).unwrap(), None);
    }

    #[test]
    fn test_save_overwrites_previous_attempt() {
        let tracker = setup();
        tracker.save_lesson(None, "food", 0, 3, 10).unwrap();
        tracker.save_lesson(None, "food", 0, 9, 10).unwrap();

        assert_eq!(tracker.all().unwrap().len(), 1);
        assert_eq!(tracker.get("food", 0).unwrap().unwrap().score, 9);
    }

    #[test]
    fn test_score_above_total_is_rejected() {
        let tracker = setup();
        let err = tracker.save_lesson(None, "food", 0, 11, 10).unwrap_err();

        assert!(matches!(err, StorageError::InvalidInput(_)));
        assert!(tracker.all().unwrap().is_empty());
    }

    #[test]
    fn test_completed_in_category() {
        let tracker = setup();
        tracker.save_lesson(None, "food", 0, 5, 10).unwrap();
        tracker.save_lesson(None, "food", 1, 5, 10).unwrap();
        tracker.save_lesson(None, "animals", 0, 5, 10).unwrap();

        assert_eq!(tracker.completed_in_category("food").unwrap(), 2);
    }

    #[test]
    fn test_completed_in_category_matches_whole_name() {
        let tracker = setup();
        tracker.save_lesson(None, "food", 0, 5, 10).unwrap();
        tracker.save_lesson(None, "food-drink", 0, 5, 10).unwrap();
        tracker.save_lesson(None, "food-drink", 1, 5, 10).unwrap();

        assert_eq!(tracker.completed_in_category("food").unwrap(), 1);
        assert_eq!(tracker.completed_in_category("food-drink").unwrap(), 2);
        assert_eq!(tracker.completed_in_category("drink").unwrap(), 0);
    }

    #[test]
    fn test_reset() {
        let tracker = setup();
        tracker.save_lesson(None, "food", 0, 5, 10).unwrap();
        tracker.reset(None).unwrap();
        assert!(tracker.all().unwrap().is_empty());
    }
}
