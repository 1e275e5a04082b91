//! Feedsync - Headless feed sync daemon
//!
//! Keeps the local story database in step with the content server. Runs a
//! pass every auto-sync interval, or once with `--once`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use feeds::{
    Credentials, FileImageCache, NewsBlurClient, RemoteApi, SqliteFeedStore, StatusListener,
    SyncHandle, SyncOrchestrator, SyncSettings, SyncShared, SyncStatus,
};
use log::{error, info, warn};

/// Upper bound on a single `--once` run
const ONCE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Logs every status change as one line
struct LogStatus;

impl StatusListener for LogStatus {
    fn on_status_changed(&self, status: &SyncStatus) {
        if let Some(message) = status.message() {
            info!("{}", message);
        }
    }

    fn on_logged_out(&self) {
        error!("Session rejected by the server; update credentials.json and restart");
    }
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let once = std::env::args().skip(1).any(|arg| arg == "--once");

    // Bootstrap config directory
    if let Err(e) = config::init() {
        warn!("Failed to initialize config directory: {}", e);
    }

    let settings = SyncSettings::load().context("Failed to load settings.json")?;
    let credentials = match Credentials::load() {
        Ok(creds) => creds,
        Err(e) => {
            if let Some(path) = Credentials::default_credentials_path() {
                warn!(
                    "To configure access, either:\n\
                     1. Place {{\"session_id\": \"...\"}} at: {}\n\
                     2. Or set the NEWSBLUR_SESSION environment variable",
                    path.display()
                );
            }
            return Err(e);
        }
    };

    let data_dir = config::ensure_data_dir()?;
    let store = Arc::new(SqliteFeedStore::new(data_dir.join("feeds.db"))?);
    let images = Arc::new(FileImageCache::new(
        data_dir.join("images"),
        Duration::from_secs(settings.request_timeout_secs),
    )?);
    let api: Arc<dyn RemoteApi> = Arc::new(NewsBlurClient::from_settings(&settings, &credentials));
    let shared = Arc::new(SyncShared::new(
        settings.default_story_order,
        settings.default_read_filter,
    ));

    let interval = Duration::from_secs(settings.auto_sync_interval_secs.max(60));
    let orchestrator = SyncOrchestrator::new(api, store, images, shared, settings);
    let sync = SyncHandle::spawn(orchestrator)?;
    sync.add_listener(Arc::new(LogStatus));

    info!("Syncing into {}", data_dir.display());
    sync.force_metadata();
    sync.request_pass();

    if once {
        if !sync.wait_idle(ONCE_TIMEOUT) {
            warn!("Sync still running after {:?}; stopping", ONCE_TIMEOUT);
        }
        return sync.shutdown();
    }

    loop {
        thread::sleep(interval);
        if sync.status().logged_out {
            sync.shutdown()?;
            anyhow::bail!("Logged out");
        }
        sync.request_pass();
    }
}
