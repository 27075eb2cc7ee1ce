use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use dictation_trainer::config::{Config, GenerationConfig, WorkerConfig};
use dictation_trainer::content::{ContentGenerator, ContentProvider, ContentSettings};
use dictation_trainer::learning::config::{LearningConfig, PersistencePolicy};
use dictation_trainer::learning::SessionEngine;
use dictation_trainer::routes::build_router;
use dictation_trainer::services::llm_provider::LlmProvider;
use dictation_trainer::state::AppState;
use dictation_trainer::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<Store>,
    pub engine: Arc<SessionEngine>,
    pub config: Config,
    _temp_dir: TempDir,
}

/// 测试用学习配置：退避时间压到 1ms
pub fn test_learning_config() -> LearningConfig {
    LearningConfig {
        persistence: PersistencePolicy {
            max_write_retries: 2,
            retry_backoff_ms: 1,
        },
        ..LearningConfig::default()
    }
}

pub fn test_config(sled_path: String) -> Config {
    // 直接构造 Config，避免 set_var 造成多线程测试环境变量竞态
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        log_json: false,
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path,
        cors_origin: "http://localhost:5173".to_string(),
        worker: WorkerConfig {
            is_leader: false,
            checkpoint_ttl_days: 30,
        },
        learning: test_learning_config(),
        generation: GenerationConfig {
            enabled: false,
            mock: true,
            audio_enabled: true,
            timeout_secs: 2,
            ..GenerationConfig::default()
        },
    }
}

pub async fn spawn_with_generator(generator: Option<Arc<dyn ContentGenerator>>) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("trainer-test.sled");
    let config = test_config(sled_path.to_string_lossy().to_string());

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let generator =
        generator.unwrap_or_else(|| Arc::new(LlmProvider::new(&config.generation)));
    let content = Arc::new(ContentProvider::new(
        store.clone(),
        generator,
        ContentSettings::from_config(&config.generation),
    ));
    let engine = Arc::new(SessionEngine::new(
        config.learning.clone(),
        store.clone(),
        store.clone(),
        content,
    ));
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let state = AppState::new(store.clone(), engine.clone(), &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        store,
        engine,
        config,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_app() -> TestApp {
    spawn_with_generator(None).await
}
