//! Danci 学习核心
//!
//! 决定"下一张卡片给谁看"以及"本地与云端不一致时以谁为准"：
//! - `srs`：SM-2 间隔重复调度
//! - `difficult`：难词错误账本
//! - `streak`：连续学习天数
//! - `sync`：本地 ↔ 云端同步引擎
//! - `storage`：SQLite 本地数据槽

pub mod catalog;
pub mod clock;
pub mod config;
pub mod difficult;
pub mod learning;
pub mod logging;
pub mod profile;
pub mod progress;
pub mod remote;
pub mod settings;
pub mod srs;
pub mod storage;
pub mod streak;
pub mod sync;

pub use catalog::{Item, ItemCatalog, StaticCatalog, LESSON_SIZE};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CoreConfig;
pub use difficult::{DifficultItem, DifficultTracker};
pub use learning::{LearningCore, LessonCompletion, QuizAnswer};
pub use profile::LanguageProfile;
pub use progress::ProgressTracker;
pub use remote::{
    EntityKind, Identity, MemoryRemoteStore, RemoteError, RemoteScope, RemoteStore, RestConfig,
    RestRemoteStore,
};
pub use settings::ThemeSettings;
pub use srs::{sm2_step, SrsScheduler};
pub use storage::{
    DifficultRecord, LessonProgress, ProgressMap, Slot, SlotStore, SrsRecord, Storage,
    StorageError, StorageResult, StreakState, ThemeMode,
};
pub use streak::StreakTracker;
pub use sync::{PullReport, PullStatus, PushOutcome, PushTicket, SyncEngine};
