//! 远端存储接口
//!
//! 云端按 (身份, 语言, 实体自然键) 保存本地数据的镜像，支持 upsert 和删除。
//! 所有调用都可能失败，失败对核心模块不是致命错误。

pub mod memory;
pub mod rest;

pub use memory::MemoryRemoteStore;
pub use rest::{RestConfig, RestRemoteStore};

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 当前学习者的不透明身份标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 远端行的归属：学习者身份 + 教学语言
///
/// 同一身份下不同语言的数据互不可见。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemoteScope {
    pub identity: Identity,
    /// 语言代码，如 `es`
    pub language: String,
}

impl RemoteScope {
    pub fn new(identity: Identity, language: impl Into<String>) -> Self {
        Self {
            identity,
            language: language.into(),
        }
    }
}

impl fmt::Display for RemoteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.identity, self.language)
    }
}

/// 同步的实体类型，每种对应一张远端表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Progress,
    Difficult,
    Srs,
    /// 主题 + 连续打卡，每个身份一行
    Settings,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Progress,
        EntityKind::Difficult,
        EntityKind::Srs,
        EntityKind::Settings,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Progress => "user_progress",
            EntityKind::Difficult => "user_difficult_words",
            EntityKind::Srs => "user_srs",
            EntityKind::Settings => "user_settings",
        }
    }

    /// 除 `user_id`、`language` 外的自然键列，设置表没有
    pub fn key_column(&self) -> Option<&'static str> {
        match self {
            EntityKind::Progress => Some("lesson_id"),
            EntityKind::Difficult | EntityKind::Srs => Some("word_id"),
            EntityKind::Settings => None,
        }
    }

    /// upsert 冲突键
    pub fn conflict_target(&self) -> &'static str {
        match self {
            EntityKind::Progress => "user_id,language,lesson_id",
            EntityKind::Difficult | EntityKind::Srs => "user_id,language,word_id",
            EntityKind::Settings => "user_id,language",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Progress => "progress",
            EntityKind::Difficult => "difficult",
            EntityKind::Srs => "srs",
            EntityKind::Settings => "settings",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 远端存储错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode remote row: {0}")]
    Decode(String),

    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// 远端记录存储
///
/// 行是 JSON 对象，列名使用 snake_case，并包含 `user_id` 和 `language`。
/// 所有操作都限定在一个 [`RemoteScope`] 内。
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_all(&self, scope: &RemoteScope, kind: EntityKind) -> RemoteResult<Vec<Value>>;

    /// 按自然键插入或覆盖；设置表的 `natural_key` 被忽略
    async fn upsert(
        &self,
        scope: &RemoteScope,
        kind: EntityKind,
        natural_key: &str,
        row: Value,
    ) -> RemoteResult<()>;

    async fn delete(&self, scope: &RemoteScope, kind: EntityKind, natural_key: &str) -> RemoteResult<()>;

    /// 删除该归属在此实体类型下的全部行
    async fn delete_all(&self, scope: &RemoteScope, kind: EntityKind) -> RemoteResult<()>;
}
