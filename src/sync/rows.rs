//! 本地记录与远端行之间的转换
//!
//! 远端列名沿用云端表结构（snake_case），与本地 JSON 槽位的字段名不同。
//! 每行都带 `user_id` 和 `language`，两者共同决定行的归属。
//! 解码时违反记录约束的行（如间隔为 0、成绩超过总分）按格式错误处理。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::remote::{RemoteError, RemoteResult, RemoteScope};
use crate::storage::{
    DifficultRecord, LessonProgress, SrsRecord, StreakState, ThemeMode, MIN_EASE_FACTOR,
};

// ============================================================
// 编码
// ============================================================

pub fn srs_row(scope: &RemoteScope, record: &SrsRecord, now: DateTime<Utc>) -> Value {
    json!({
        "user_id": scope.identity.as_str(),
        "language": scope.language,
        "word_id": record.item_id,
        "next_review": record.next_review_at,
        "interval": record.interval,
        "ease_factor": record.ease_factor,
        "repetitions": record.repetitions,
        "updated_at": now.to_rfc3339(),
    })
}

pub fn difficult_row(scope: &RemoteScope, record: &DifficultRecord) -> Value {
    json!({
        "user_id": scope.identity.as_str(),
        "language": scope.language,
        "word_id": record.item_id,
        "error_count": record.error_count,
        "last_error": record.last_error_at,
    })
}

pub fn progress_row(scope: &RemoteScope, progress: &LessonProgress, now: DateTime<Utc>) -> Value {
    json!({
        "user_id": scope.identity.as_str(),
        "language": scope.language,
        "lesson_id": progress.lesson_id,
        "completed": progress.completed,
        "score": progress.score,
        "total": progress.total,
        "updated_at": now.to_rfc3339(),
    })
}

pub fn theme_row(scope: &RemoteScope, theme: ThemeMode, now: DateTime<Utc>) -> Value {
    json!({
        "user_id": scope.identity.as_str(),
        "language": scope.language,
        "theme": theme.as_str(),
        "updated_at": now.to_rfc3339(),
    })
}

/// 连续打卡行，`last_sync_time` 填写本次推送时间
pub fn streak_row(scope: &RemoteScope, state: &StreakState, now: DateTime<Utc>) -> Value {
    json!({
        "user_id": scope.identity.as_str(),
        "language": scope.language,
        "streak": state.streak_count,
        "last_activity_date": state.last_activity_date.map(|d| d.format("%Y-%m-%d").to_string()),
        "last_sync_time": now.to_rfc3339(),
        "updated_at": now.to_rfc3339(),
    })
}

// ============================================================
// 解码
// ============================================================

#[derive(Deserialize)]
struct SrsRow {
    word_id: String,
    next_review: i64,
    interval: u32,
    #[serde(deserialize_with = "number_or_string")]
    ease_factor: f64,
    repetitions: u32,
}

#[derive(Deserialize)]
struct DifficultRow {
    word_id: String,
    error_count: u32,
    last_error: i64,
}

#[derive(Deserialize)]
struct ProgressRow {
    lesson_id: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    score: Option<u32>,
    #[serde(default)]
    total: Option<u32>,
}

#[derive(Deserialize, Default)]
struct SettingsRow {
    #[serde(default)]
    theme: Option<String>,
    #[serde(default)]
    streak: Option<u32>,
    #[serde(default)]
    last_activity_date: Option<String>,
    #[serde(default)]
    last_sync_time: Option<String>,
}

/// 远端设置行中实际存在的字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub theme: Option<ThemeMode>,
    pub streak: Option<u32>,
    pub last_activity_date: Option<NaiveDate>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl SettingsPatch {
    /// 只覆盖远端给出的打卡字段
    pub fn apply_to_streak(&self, state: &mut StreakState) {
        if let Some(streak) = self.streak {
            state.streak_count = streak;
        }
        if let Some(date) = self.last_activity_date {
            state.last_activity_date = Some(date);
        }
        if let Some(at) = self.last_sync_at {
            state.last_sync_at = Some(at);
        }
    }

    pub fn touches_streak(&self) -> bool {
        self.streak.is_some() || self.last_activity_date.is_some() || self.last_sync_at.is_some()
    }
}

fn decode<T: for<'de> Deserialize<'de>>(row: Value) -> RemoteResult<T> {
    serde_json::from_value(row).map_err(|e| RemoteError::Decode(e.to_string()))
}

fn invalid(reason: String) -> RemoteError {
    RemoteError::Decode(reason)
}

pub fn decode_srs(row: Value) -> RemoteResult<SrsRecord> {
    let row: SrsRow = decode(row)?;
    if row.interval == 0 {
        return Err(invalid(format!("srs row {} has interval 0", row.word_id)));
    }
    if !row.ease_factor.is_finite() || row.ease_factor < MIN_EASE_FACTOR {
        return Err(invalid(format!(
            "srs row {} has ease factor {} below {}",
            row.word_id, row.ease_factor, MIN_EASE_FACTOR
        )));
    }
    Ok(SrsRecord {
        item_id: row.word_id,
        next_review_at: row.next_review,
        interval: row.interval,
        ease_factor: row.ease_factor,
        repetitions: row.repetitions,
    })
}

pub fn decode_difficult(row: Value) -> RemoteResult<DifficultRecord> {
    let row: DifficultRow = decode(row)?;
    if row.error_count == 0 {
        return Err(invalid(format!("difficult row {} has error count 0", row.word_id)));
    }
    Ok(DifficultRecord {
        item_id: row.word_id,
        error_count: row.error_count,
        last_error_at: row.last_error,
    })
}

pub fn decode_progress(row: Value) -> RemoteResult<LessonProgress> {
    let row: ProgressRow = decode(row)?;
    let score = row.score.unwrap_or(0);
    let total = row.total.unwrap_or(0);
    if score > total {
        return Err(invalid(format!(
            "progress row {} has score {} above total {}",
            row.lesson_id, score, total
        )));
    }
    Ok(LessonProgress {
        lesson_id: row.lesson_id,
        completed: row.completed,
        score,
        total,
    })
}

/// 解析设置行；无法识别的主题或日期会被忽略
pub fn decode_settings(row: Value) -> RemoteResult<SettingsPatch> {
    let row: SettingsRow = decode(row)?;

    Ok(SettingsPatch {
        theme: row.theme.as_deref().and_then(|t| t.parse().ok()),
        streak: row.streak,
        last_activity_date: row
            .last_activity_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        last_sync_at: row
            .last_sync_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc)),
    })
}

/// numeric 列可能以字符串形式返回
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::Identity;

    fn scope() -> RemoteScope {
        RemoteScope::new(Identity::new("u1"), "es")
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    #[test]
    fn test_srs_row_columns() {
        let record = SrsRecord::new("w1", 10);
        let row = srs_row(&scope(), &record, now());
        assert_eq!(row["user_id"], "u1");
        assert_eq!(row["language"], "es");
        assert_eq!(row["word_id"], "w1");
        assert_eq!(row["next_review"], 10);
        assert_eq!(decode_srs(row).unwrap(), record);
    }

    #[test]
    fn test_decode_srs_with_string_ease_factor() {
        let row = json!({
            "user_id": "u1",
            "word_id": "w1",
            "next_review": 5,
            "interval": 6,
            "ease_factor": "2.36",
            "repetitions": 2
        });
        let record = decode_srs(row).unwrap();
        assert_eq!(record.ease_factor, 2.36);
        assert_eq!(record.interval, 6);
    }

    #[test]
    fn test_decode_srs_missing_column_is_decode_error() {
        let err = decode_srs(json!({"word_id": "w1"})).unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_out_of_range_rows() {
        let srs = |interval: u32, ease: f64| {
            json!({"word_id": "w1", "next_review": 0, "interval": interval, "ease_factor": ease, "repetitions": 1})
        };
        assert!(matches!(decode_srs(srs(0, 2.5)), Err(RemoteError::Decode(_))));
        assert!(matches!(decode_srs(srs(3, 1.2)), Err(RemoteError::Decode(_))));
        assert!(decode_srs(srs(3, 1.3)).is_ok());

        let difficult = decode_difficult(json!({"word_id": "w1", "error_count": 0, "last_error": 5}));
        assert!(matches!(difficult, Err(RemoteError::Decode(_))));

        let progress = decode_progress(json!({"lesson_id": "food-0", "completed": true, "score": 11, "total": 10}));
        assert!(matches!(progress, Err(RemoteError::Decode(_))));
    }

    #[test]
    fn test_decode_progress_null_score() {
        let progress = decode_progress(json!({
            "lesson_id": "food-1",
            "completed": true,
            "score": null,
            "total": null
        }))
        .unwrap();
        assert_eq!(progress.score, 0);
        assert!(progress.completed);
    }

    #[test]
    fn test_decode_settings_partial() {
        let patch = decode_settings(json!({"user_id": "u1", "theme": "dark"})).unwrap();
        assert_eq!(patch.theme, Some(ThemeMode::Dark));
        assert!(!patch.touches_streak());

        let patch = decode_settings(json!({
            "theme": "neon",
            "streak": 4,
            "last_activity_date": "2026-03-02",
            "last_sync_time": "2026-03-02T10:00:00+00:00"
        }))
        .unwrap();
        assert_eq!(patch.theme, None);
        assert_eq!(patch.streak, Some(4));
        assert_eq!(
            patch.last_activity_date,
            NaiveDate::from_ymd_opt(2026, 3, 2)
        );
        assert!(patch.last_sync_at.is_some());
    }

    #[test]
    fn test_settings_patch_only_overwrites_present_fields() {
        let mut state = StreakState {
            streak_count: 7,
            last_activity_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            last_sync_at: None,
        };
        SettingsPatch {
            streak: Some(2),
            ..Default::default()
        }
        .apply_to_streak(&mut state);

        assert_eq!(state.streak_count, 2);
        assert_eq!(state.last_activity_date, NaiveDate::from_ymd_opt(2026, 1, 1));
    }

    #[test]
    fn test_streak_row_dates() {
        let state = StreakState {
            streak_count: 3,
            last_activity_date: NaiveDate::from_ymd_opt(2026, 3, 2),
            last_sync_at: None,
        };
        let row = streak_row(&scope(), &state, now());
        assert_eq!(row["language"], "es");
        assert_eq!(row["last_activity_date"], "2026-03-02");
        assert_eq!(row["streak"], 3);

        let patch = decode_settings(row).unwrap();
        assert_eq!(patch.last_sync_at, Some(now()));
    }
}
