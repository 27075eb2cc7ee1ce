use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::learning::SessionEngine;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    engine: Arc<SessionEngine>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        engine: Arc<SessionEngine>,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            store,
            engine,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::broadcast;

    use crate::content::{ContentProvider, ContentSettings, MemoryCache};
    use crate::content::misspell::MisspellingGenerator;
    use crate::learning::config::LearningConfig;

    use super::*;

    fn state(path: &std::path::Path, tx: broadcast::Sender<()>) -> AppState {
        let store = Arc::new(Store::open(path.to_str().unwrap()).unwrap());
        let content = Arc::new(ContentProvider::new(
            Arc::new(MemoryCache::new()),
            Arc::new(MisspellingGenerator::new(3)),
            ContentSettings::default(),
        ));
        let engine = Arc::new(SessionEngine::new(
            LearningConfig::default(),
            store.clone(),
            store.clone(),
            content,
        ));
        AppState::new(store, engine, &Config::from_env(), tx)
    }

    #[tokio::test]
    async fn shutdown_receiver_can_clone() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let (tx, _) = broadcast::channel(4);
        let state = state(&tmp.path().join("state_shutdown.sled"), tx.clone());

        let mut rx1 = state.shutdown_rx();
        let mut rx2 = state.shutdown_rx();
        tx.send(()).unwrap();
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();
    }

    #[tokio::test]
    async fn engine_starts_without_live_sessions() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let (tx, _) = broadcast::channel(4);
        let state = state(&tmp.path().join("state_engine.sled"), tx);
        assert_eq!(state.engine().live_session_count().await, 0);
        assert!(state.uptime_secs() < 5);
    }
}
