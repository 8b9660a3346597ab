use std::path::PathBuf;

use crate::profile::LanguageProfile;
use crate::remote::{Identity, RestConfig};

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    /// 未配置 `DANCI_REMOTE_URL` 时为纯本地模式
    pub remote: Option<RestConfig>,
    pub identity: Option<Identity>,
    pub languages: Vec<LanguageProfile>,
    pub log_level: String,
    /// `ENABLE_FILE_LOGS` 打开时的滚动日志目录
    pub log_dir: Option<PathBuf>,
}

impl CoreConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取配置
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = non_empty("DANCI_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./danci-core.db"));

        let timeout_secs = non_empty("DANCI_REMOTE_TIMEOUT_SECS")
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(30);

        let remote = non_empty("DANCI_REMOTE_URL").map(|base_url| RestConfig {
            base_url,
            api_key: non_empty("DANCI_REMOTE_KEY").unwrap_or_default(),
            timeout_secs,
        });

        let identity = non_empty("DANCI_IDENTITY").map(Identity::new);

        let mut languages: Vec<LanguageProfile> = non_empty("DANCI_LANGUAGES")
            .unwrap_or_else(|| "es,en".to_string())
            .split(',')
            .filter_map(LanguageProfile::from_code)
            .collect();
        languages.dedup_by(|a, b| a.code == b.code);
        if languages.is_empty() {
            languages.push(LanguageProfile::spanish());
        }

        let log_level = non_empty("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let file_logs = non_empty("ENABLE_FILE_LOGS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let log_dir = file_logs.then(|| {
            non_empty("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./logs"))
        });

        Self {
            db_path,
            remote,
            identity,
            languages,
            log_level,
            log_dir,
        }
    }
}
