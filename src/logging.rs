//! 日志初始化
//!
//! 标准输出始终开启；配置了日志目录时另写一份按天滚动的文件日志。

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "danci-core.log";

/// 文件日志的后台写入句柄，丢弃后停止写文件
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// 安装全局 tracing subscriber；已安装时不做任何事
///
/// 日志目录无法创建时退回只写标准输出。
pub fn init_tracing(log_level: &str, log_dir: Option<&Path>) -> Option<FileLogGuard> {
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(true);

    if let Some(dir) = log_dir {
        match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let file_layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true);

                let installed = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(stdout_layer)
                    .with(file_layer)
                    .try_init()
                    .is_ok();

                return installed.then_some(FileLogGuard { _guard: guard });
            }
            Err(err) => eprintln!("failed to create log directory {}: {err}", dir.display()),
        }
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .try_init();

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_is_created() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("logs").join("core");

        let _guard = init_tracing("debug", Some(dir.as_path()));

        assert!(dir.is_dir());
    }
}
