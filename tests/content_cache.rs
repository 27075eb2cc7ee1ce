mod common;

use std::sync::Arc;
use std::time::Duration;

use dictation_trainer::content::{
    ArtifactKey, ArtifactKind, CacheStore, ContentError, ContentProvider, ContentSettings,
    MemoryCache,
};
use dictation_trainer::learning::types::DifficultyMix;

use common::fixtures::{open_store, CountingGenerator};

fn settings(timeout_ms: u64, version: &str) -> ContentSettings {
    ContentSettings {
        timeout: Duration::from_millis(timeout_ms),
        config_version: version.to_string(),
        variants_count: 3,
        audio_enabled: true,
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn key_ignores_case_and_whitespace_but_not_version() {
    let a = ArtifactKey::new("Cat", ArtifactKind::Variants, "v1");
    let b = ArtifactKey::new("  cAT ", ArtifactKind::Variants, "v1");
    let c = ArtifactKey::new("Cat", ArtifactKind::Variants, "v2");
    let d = ArtifactKey::new("Cat", ArtifactKind::Audio, "v1");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(a, d);
    assert_eq!(a.as_str().len(), 64);
}

#[tokio::test]
async fn cached_variants_are_generated_once() {
    let generator = Arc::new(CountingGenerator::default());
    let provider = ContentProvider::new(
        Arc::new(MemoryCache::new()),
        generator.clone(),
        settings(1_000, "v1"),
    );
    let list = words(&["Cat", "Dog"]);

    let first = provider.prefetch_variants(&list, DifficultyMix::default()).await;
    assert_eq!(first.generated, 2);
    let second = provider.prefetch_variants(&list, DifficultyMix::default()).await;
    assert_eq!(second.cached, 2);
    assert_eq!(second.generated, 0);

    let a = provider.variants_for("Cat", DifficultyMix::default()).await.unwrap();
    let b = provider.variants_for("cat", DifficultyMix::default()).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 3);
    assert!(a.iter().all(|v| v.to_lowercase() != "cat"));

    assert_eq!(generator.batches(), 1);
    assert_eq!(generator.singles(), 0);
}

#[tokio::test]
async fn new_config_version_regenerates() {
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let generator = Arc::new(CountingGenerator::default());
    let v1 = ContentProvider::new(cache.clone(), generator.clone(), settings(1_000, "v1"));
    let v2 = ContentProvider::new(cache, generator.clone(), settings(1_000, "v2"));

    v1.variants_for("Cat", DifficultyMix::default()).await.unwrap();
    v1.variants_for("Cat", DifficultyMix::default()).await.unwrap();
    v2.variants_for("Cat", DifficultyMix::default()).await.unwrap();
    assert_eq!(generator.batches(), 2);
}

#[tokio::test]
async fn batch_timeout_falls_back_to_single_word() {
    let generator = Arc::new(CountingGenerator::slow_batch(Duration::from_millis(300)));
    let provider = ContentProvider::new(
        Arc::new(MemoryCache::new()),
        generator.clone(),
        settings(40, "v1"),
    );

    let report = provider
        .prefetch_variants(&words(&["Cat"]), DifficultyMix::default())
        .await;
    assert_eq!(report.failed, 1);

    let variants = provider
        .variants_for("Cat", DifficultyMix::default())
        .await
        .unwrap();
    assert_eq!(variants.len(), 3);
    assert_eq!(generator.singles(), 1);

    // 降级结果同样写入缓存
    provider
        .variants_for("Cat", DifficultyMix::default())
        .await
        .unwrap();
    assert_eq!(generator.singles(), 1);
}

#[tokio::test]
async fn double_timeout_is_unavailable() {
    let generator = Arc::new(CountingGenerator::slow_everything(Duration::from_millis(300)));
    let provider = ContentProvider::new(
        Arc::new(MemoryCache::new()),
        generator,
        settings(30, "v1"),
    );

    let err = provider
        .variants_for("Cat", DifficultyMix::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ContentError::Unavailable {
            kind: ArtifactKind::Variants,
            ..
        }
    ));
}

#[tokio::test]
async fn prompt_mixes_word_with_variants_and_audio() {
    let generator = Arc::new(CountingGenerator::default());
    let provider = ContentProvider::new(
        Arc::new(MemoryCache::new()),
        generator.clone(),
        settings(1_000, "v1"),
    );

    let prompt = provider
        .prompt_for("Cat", DifficultyMix::for_incorrect_count(2))
        .await
        .unwrap();
    assert_eq!(prompt.word, "Cat");
    assert_eq!(prompt.options.len(), 4);
    assert_eq!(
        prompt.options.iter().filter(|o| o.as_str() == "Cat").count(),
        1
    );
    assert!(prompt.has_audio);

    let audio = provider.audio_for("Cat").await.unwrap().unwrap();
    assert_eq!(audio, b"AUDIO:Cat".to_vec());
    assert_eq!(generator.audio(), 1);
}

#[tokio::test]
async fn sled_cache_is_shared_across_providers() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let generator = Arc::new(CountingGenerator::default());

    let first = ContentProvider::new(store.clone(), generator.clone(), settings(1_000, "v1"));
    let generated = first
        .variants_for("Собака", DifficultyMix::default())
        .await
        .unwrap();

    let second = ContentProvider::new(store.clone(), generator.clone(), settings(1_000, "v1"));
    let cached = second
        .variants_for("собака", DifficultyMix::default())
        .await
        .unwrap();

    assert_eq!(generated, cached);
    assert_eq!(generator.batches(), 1);
    assert!(store.artifact_cache_len() >= 1);
}

#[tokio::test]
async fn struggling_words_get_their_own_easier_variants() {
    let generator = Arc::new(CountingGenerator::default());
    let provider = ContentProvider::new(
        Arc::new(MemoryCache::new()),
        generator.clone(),
        settings(1_000, "v1"),
    );

    provider
        .prefetch_variants(&words(&["Cat"]), DifficultyMix::default())
        .await;
    let struggling = DifficultyMix::for_incorrect_count(3);
    provider.variants_for("Cat", struggling).await.unwrap();
    provider.variants_for("Cat", struggling).await.unwrap();

    assert_eq!(generator.batches(), 2);
    assert_eq!(generator.mixes(), vec![DifficultyMix::default(), struggling]);
    assert!(generator.mixes()[1].easy >= 1);
}
