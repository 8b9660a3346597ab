//! 单词目录
//!
//! 核心模块本身不保存单词内容，只通过 [`ItemCatalog`] 按 ID 或分类查找。

use serde::{Deserialize, Serialize};

/// 每课单词数
pub const LESSON_SIZE: usize = 10;

/// 可学习的单词条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    /// 外语词
    pub term: String,
    /// 释义
    pub translation: String,
    /// 发音提示
    #[serde(default)]
    pub transcription: String,
    pub category: String,
}

impl Item {
    pub fn new(
        id: impl Into<String>,
        term: impl Into<String>,
        translation: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            term: term.into(),
            translation: translation.into(),
            transcription: String::new(),
            category: category.into(),
        }
    }

    pub fn with_transcription(mut self, transcription: impl Into<String>) -> Self {
        self.transcription = transcription.into();
        self
    }
}

pub trait ItemCatalog: Send + Sync {
    fn by_id(&self, item_id: &str) -> Option<Item>;

    /// 按目录顺序返回分类下的全部单词
    fn by_category(&self, category: &str) -> Vec<Item>;

    fn all(&self) -> Vec<Item>;

    /// 将分类按 [`LESSON_SIZE`] 切分为课程
    fn lessons_for_category(&self, category: &str) -> Vec<Vec<Item>> {
        self.by_category(category)
            .chunks(LESSON_SIZE)
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// 课程下标越界时返回空列表
    fn lesson_items(&self, category: &str, lesson_index: usize) -> Vec<Item> {
        self.by_category(category)
            .chunks(LESSON_SIZE)
            .nth(lesson_index)
            .map(|chunk| chunk.to_vec())
            .unwrap_or_default()
    }

    fn lesson_count(&self, category: &str) -> usize {
        self.by_category(category).len().div_ceil(LESSON_SIZE)
    }
}

/// 内存目录
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    items: Vec<Item>,
}

impl StaticCatalog {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 追加新单词，已存在的 ID 会被跳过；返回实际新增数
    pub fn extend(&mut self, items: impl IntoIterator<Item = Item>) -> usize {
        let before = self.items.len();
        for item in items {
            if !self.items.iter().any(|existing| existing.id == item.id) {
                self.items.push(item);
            }
        }
        self.items.len() - before
    }
}

impl ItemCatalog for StaticCatalog {
    fn by_id(&self, item_id: &str) -> Option<Item> {
        self.items.iter().find(|item| item.id == item_id).cloned()
    }

    fn by_category(&self, category: &str) -> Vec<Item> {
        self.items
            .iter()
            .filter(|item| item.category == category)
            .cloned()
            .collect()
    }

    fn all(&self) -> Vec<Item> {
        self.items.clone()
    }
}
