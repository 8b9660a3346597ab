//! 数据模型定义
//!
//! 本地数据槽中保存的全部记录类型。所有记录都只通过标识符（单词 ID、课程 ID）
//! 互相关联，读取时再做查找。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 一天的毫秒数
pub const DAY_MS: i64 = 86_400_000;

/// 难度系数下限
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// 新卡片的初始难度系数
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

// ============================================================
// Slot - 数据槽
// ============================================================

/// 本地存储中的逻辑数据槽，每种实体一个
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Progress,
    Difficult,
    Srs,
    Theme,
    Streak,
}

impl Slot {
    pub const ALL: [Slot; 5] = [
        Slot::Progress,
        Slot::Difficult,
        Slot::Srs,
        Slot::Theme,
        Slot::Streak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Progress => "progress",
            Slot::Difficult => "difficult",
            Slot::Srs => "srs",
            Slot::Theme => "theme",
            Slot::Streak => "streak",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// SrsRecord - 间隔重复记录
// ============================================================

/// 单个单词的间隔重复状态
///
/// `next_review_at` 始终等于最后一次更新时的 `now + interval * DAY_MS`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsRecord {
    pub item_id: String,
    /// 下次复习时间 (Unix 毫秒)
    pub next_review_at: i64,
    /// 复习间隔 (天, >= 1)
    pub interval: u32,
    /// 难度系数 (>= 1.3)
    pub ease_factor: f64,
    /// 连续答对次数
    pub repetitions: u32,
}

impl SrsRecord {
    /// 首次复习前的初始状态，立即到期
    pub fn new(item_id: impl Into<String>, now_ms: i64) -> Self {
        Self {
            item_id: item_id.into(),
            next_review_at: now_ms,
            interval: 1,
            ease_factor: DEFAULT_EASE_FACTOR,
            repetitions: 0,
        }
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        self.next_review_at <= now_ms
    }
}

// ============================================================
// DifficultRecord - 难词记录
// ============================================================

/// 难词错误账本中的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultRecord {
    pub item_id: String,
    /// 累计错误次数 (>= 1)
    pub error_count: u32,
    /// 最近一次出错时间 (Unix 毫秒)
    pub last_error_at: i64,
}

// ============================================================
// LessonProgress - 课程进度
// ============================================================

/// 课程测验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    /// 课程 ID，格式为 `{category}-{index}`
    pub lesson_id: String,
    pub completed: bool,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub total: u32,
}

impl LessonProgress {
    pub fn lesson_id(category: &str, lesson_index: usize) -> String {
        format!("{}-{}", category, lesson_index)
    }
}

/// 课程 ID -> 课程进度
pub type ProgressMap = BTreeMap<String, LessonProgress>;

// ============================================================
// StreakState - 连续学习天数
// ============================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakState {
    #[serde(default)]
    pub streak_count: u32,
    #[serde(default)]
    pub last_activity_date: Option<NaiveDate>,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
}

// ============================================================
// ThemeMode - 主题偏好
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            other => Err(format!("unknown theme mode: {other}")),
        }
    }
}
