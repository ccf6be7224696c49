use crate::config::AppConfig;
use tokio::sync::Mutex;

pub struct AppState {
    pub config: AppConfig,
    /// Held for the whole of an ingest run; there is a single consumer of the manifest
    pub ingest_lock: Mutex<()>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            ingest_lock: Mutex::new(()),
        }
    }
}
