use std::sync::Arc;

use danci_core::config::CoreConfig;
use danci_core::logging::init_tracing;
use danci_core::{Clock, LearningCore, RemoteStore, RestRemoteStore, Storage, SystemClock};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = CoreConfig::from_env();
    let _log_guard = init_tracing(&config.log_level, config.log_dir.as_deref());

    let storage = match Storage::open(&config.db_path) {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!(path = %config.db_path.display(), error = %e, "failed to open local store");
            std::process::exit(1);
        }
    };

    let remote: Option<Arc<dyn RemoteStore>> = match config.remote.clone() {
        Some(rest) => match RestRemoteStore::new(rest) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                tracing::warn!(error = %e, "remote store not initialized, running local-only");
                None
            }
        },
        None => None,
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    for profile in &config.languages {
        let mut core = LearningCore::new(profile.clone(), &storage, remote.clone(), Arc::clone(&clock));
        let report = core.start_session(config.identity.clone()).await;

        let summary = (
            core.due_count(),
            core.streak(),
            core.difficult_tracker().records().map(|r| r.len()),
            core.theme(),
        );

        match summary {
            (Ok(due), Ok(streak), Ok(difficult), Ok(theme)) => tracing::info!(
                language = %profile.code,
                online = core.is_online(),
                pulled = report.all_applied(),
                due,
                streak,
                difficult,
                theme = %theme,
                "session ready"
            ),
            _ => tracing::error!(language = %profile.code, "failed to read local state"),
        }
    }
}
