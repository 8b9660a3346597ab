//! 语言配置
//!
//! 同一套学习核心按语言各实例化一份，每份有独立的存储命名空间。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// 语言代码，如 `es`
    pub code: String,
    pub display_name: String,
    /// 语音朗读使用的区域设置，如 `es-ES`
    pub speech_locale: String,
    /// 本地存储命名空间
    pub namespace: String,
}

impl LanguageProfile {
    pub fn new(
        code: impl Into<String>,
        display_name: impl Into<String>,
        speech_locale: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            display_name: display_name.into(),
            speech_locale: speech_locale.into(),
            namespace: namespace.into(),
        }
    }

    pub fn spanish() -> Self {
        Self::new("es", "Español", "es-ES", "espanol")
    }

    pub fn english() -> Self {
        Self::new("en", "English", "en-US", "english")
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "es" => Some(Self::spanish()),
            "en" => Some(Self::english()),
            _ => None,
        }
    }

    /// 语音区域设置的语言前缀，用于挑选系统语音
    pub fn voice_prefix(&self) -> &str {
        self.speech_locale
            .split('-')
            .next()
            .unwrap_or(&self.speech_locale)
    }
}
