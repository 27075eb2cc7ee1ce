use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use dictation_trainer::content::generator::GenerationError;
use dictation_trainer::content::misspell::MisspellingGenerator;
use dictation_trainer::content::{ContentGenerator, ContentProvider, ContentSettings, MemoryCache};
use dictation_trainer::learning::persistence::{
    CheckpointSummary, PersistenceError, ProgressStore, SessionPersistence,
};
use dictation_trainer::learning::session::LearningSession;
use dictation_trainer::learning::types::DifficultyMix;
use dictation_trainer::learning::SessionEngine;
use dictation_trainer::store::operations::dictionaries::Dictionary;
use dictation_trainer::store::{Store, StoreError};

use super::app::test_learning_config;

pub fn seed_dictionary(store: &Store, user_id: &str, words: &[&str]) -> Dictionary {
    store
        .create_dictionary(user_id, Some("Animals"), words)
        .expect("create seed dictionary")
}

pub fn open_store(dir: &tempfile::TempDir) -> Arc<Store> {
    let store = Arc::new(
        Store::open(dir.path().join("fixture.sled").to_str().expect("utf8 path"))
            .expect("open store"),
    );
    store.run_migrations().expect("run migrations");
    store
}

pub fn offline_content() -> Arc<ContentProvider> {
    content_with(Arc::new(MisspellingGenerator::new(3)), ContentSettings::default())
}

pub fn content_with(
    generator: Arc<dyn ContentGenerator>,
    settings: ContentSettings,
) -> Arc<ContentProvider> {
    Arc::new(ContentProvider::new(
        Arc::new(MemoryCache::new()),
        generator,
        settings,
    ))
}

pub fn engine_with(
    store: Arc<Store>,
    persistence: Arc<dyn SessionPersistence>,
    content: Arc<ContentProvider>,
) -> SessionEngine {
    SessionEngine::new(test_learning_config(), persistence, store, content)
}

/// 统计调用次数的生成器，委托给离线生成器
#[derive(Default)]
pub struct CountingGenerator {
    pub batch_calls: AtomicUsize,
    pub single_calls: AtomicUsize,
    pub audio_calls: AtomicUsize,
    /// 每次批量调用收到的难度配比
    pub batch_mixes: Mutex<Vec<DifficultyMix>>,
    /// 批量调用延迟；超过内容超时即触发单词降级
    pub batch_delay: Option<Duration>,
    /// 单词调用延迟
    pub single_delay: Option<Duration>,
}

impl CountingGenerator {
    pub fn slow_batch(delay: Duration) -> Self {
        Self {
            batch_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn slow_everything(delay: Duration) -> Self {
        Self {
            batch_delay: Some(delay),
            single_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn batches(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn singles(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn audio(&self) -> usize {
        self.audio_calls.load(Ordering::SeqCst)
    }

    pub fn mixes(&self) -> Vec<DifficultyMix> {
        self.batch_mixes.lock().expect("mixes lock").clone()
    }
}

impl ContentGenerator for CountingGenerator {
    fn generate_variants_batch<'a>(
        &'a self,
        words: &'a [String],
        mix: DifficultyMix,
    ) -> BoxFuture<'a, Result<HashMap<String, Vec<String>>, GenerationError>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_mixes.lock().expect("mixes lock").push(mix);
        async move {
            if let Some(delay) = self.batch_delay {
                tokio::time::sleep(delay).await;
            }
            let offline = MisspellingGenerator::new(3);
            let mut out = HashMap::new();
            for word in words {
                out.insert(word.clone(), offline.generate(word)?);
            }
            Ok(out)
        }
        .boxed()
    }

    fn generate_variants_single<'a>(
        &'a self,
        word: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, GenerationError>> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if let Some(delay) = self.single_delay {
                tokio::time::sleep(delay).await;
            }
            MisspellingGenerator::new(3).generate(word)
        }
        .boxed()
    }

    fn synthesize_audio<'a>(
        &'a self,
        word: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, GenerationError>> {
        self.audio_calls.fetch_add(1, Ordering::SeqCst);
        async move { Ok(format!("AUDIO:{word}").into_bytes()) }.boxed()
    }
}

/// 在真实存储外包一层，按需让写操作失败
pub struct FlakyPersistence {
    pub inner: Arc<Store>,
    pub failing_saves: AtomicUsize,
    pub failing_deletes: AtomicUsize,
    pub save_attempts: AtomicUsize,
}

impl FlakyPersistence {
    pub fn new(inner: Arc<Store>) -> Self {
        Self {
            inner,
            failing_saves: AtomicUsize::new(0),
            failing_deletes: AtomicUsize::new(0),
            save_attempts: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_saves(&self, n: usize) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_deletes(&self, n: usize) {
        self.failing_deletes.store(n, Ordering::SeqCst);
    }

    pub fn save_attempts(&self) -> usize {
        self.save_attempts.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl SessionPersistence for FlakyPersistence {
    fn save(&self, session: &LearningSession) -> Result<(), PersistenceError> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_saves) {
            return Err(StoreError::Validation("injected save failure".to_string()).into());
        }
        self.inner.save(session)
    }

    fn load(&self, user_id: &str, session_id: &str) -> Result<LearningSession, PersistenceError> {
        self.inner.load(user_id, session_id)
    }

    fn delete(&self, user_id: &str, session_id: &str) -> Result<(), PersistenceError> {
        if Self::take_failure(&self.failing_deletes) {
            return Err(StoreError::Validation("injected delete failure".to_string()).into());
        }
        self.inner.delete(user_id, session_id)
    }

    fn list(&self, user_id: &str) -> Result<Vec<CheckpointSummary>, PersistenceError> {
        self.inner.list(user_id)
    }
}

/// 读取进度时不走引擎缓存，直接查存储
pub fn stored_progress(
    store: &Store,
    user_id: &str,
) -> Option<dictation_trainer::store::operations::user_progress::UserProgress> {
    ProgressStore::load_progress(store, user_id).expect("load progress")
}

/// 把 fmt 层的输出收集到内存里，供断言日志上下文
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("logs lock")).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("logs lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
