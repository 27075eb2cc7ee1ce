use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::Serialize;

use crate::config::GenerationConfig;
use crate::content::cache::{Artifact, ArtifactKey, ArtifactKind, CacheStore};
use crate::content::generator::{sanitize_variants, ContentGenerator};
use crate::content::ContentError;
use crate::learning::types::DifficultyMix;

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub timeout: Duration,
    pub config_version: String,
    pub variants_count: usize,
    pub audio_enabled: bool,
}

impl ContentSettings {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            config_version: config.config_version.clone(),
            variants_count: config.variants_count.max(1),
            audio_enabled: config.audio_enabled,
        }
    }
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

/// 展示给学习者的题目：正确拼写混在错误拼写中
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordPrompt {
    pub word: String,
    pub options: Vec<String>,
    pub has_audio: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefetchReport {
    pub cached: usize,
    pub generated: usize,
    pub failed: usize,
}

/// 先查缓存，未命中时调用生成器（批量 -> 单词降级），成功结果写回缓存。
pub struct ContentProvider {
    cache: Arc<dyn CacheStore>,
    generator: Arc<dyn ContentGenerator>,
    settings: ContentSettings,
}

impl ContentProvider {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        generator: Arc<dyn ContentGenerator>,
        settings: ContentSettings,
    ) -> Self {
        Self {
            cache,
            generator,
            settings,
        }
    }

    /// 变体按难度配比分别缓存，音频只与单词和版本相关
    pub fn variants_key(&self, word: &str, mix: DifficultyMix) -> ArtifactKey {
        let scope = format!(
            "{}/{}-{}-{}",
            self.settings.config_version, mix.easy, mix.medium, mix.hard
        );
        ArtifactKey::new(word, ArtifactKind::Variants, &scope)
    }

    pub fn audio_key(&self, word: &str) -> ArtifactKey {
        ArtifactKey::new(word, ArtifactKind::Audio, &self.settings.config_version)
    }

    /// 缓存读失败按未命中处理
    fn cached(&self, word: &str, key: &ArtifactKey, kind: ArtifactKind) -> Option<Artifact> {
        match self.cache.get(key) {
            Ok(hit) => hit.filter(|a| a.kind() == kind),
            Err(e) => {
                tracing::warn!(word, kind = %kind, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    fn store(&self, word: &str, key: &ArtifactKey, artifact: Artifact) {
        if let Err(e) = self.cache.put(key, &artifact) {
            tracing::warn!(word, kind = %artifact.kind(), error = %e, "Cache write failed");
        }
    }

    fn cached_variants(&self, word: &str, mix: DifficultyMix) -> Option<Vec<String>> {
        let key = self.variants_key(word, mix);
        match self.cached(word, &key, ArtifactKind::Variants) {
            Some(Artifact::Variants(v)) if !v.is_empty() => Some(v),
            _ => None,
        }
    }

    /// 会话开始时为缓存未命中的单词批量生成变体，失败的单词留给答题时的降级路径
    pub async fn prefetch_variants(&self, words: &[String], mix: DifficultyMix) -> PrefetchReport {
        let mut report = PrefetchReport::default();
        let misses: Vec<String> = words
            .iter()
            .filter(|w| self.cached_variants(w, mix).is_none())
            .cloned()
            .collect();
        report.cached = words.len() - misses.len();
        if misses.is_empty() {
            return report;
        }

        match tokio::time::timeout(
            self.settings.timeout,
            self.generator.generate_variants_batch(&misses, mix),
        )
        .await
        {
            Ok(Ok(batch)) => {
                for word in &misses {
                    let variants = batch
                        .get(word)
                        .map(|v| sanitize_variants(word, v.clone(), self.settings.variants_count))
                        .unwrap_or_default();
                    if variants.is_empty() {
                        report.failed += 1;
                    } else {
                        let key = self.variants_key(word, mix);
                        self.store(word, &key, Artifact::Variants(variants));
                        report.generated += 1;
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(words = misses.len(), error = %e, "Batch generation failed");
                report.failed = misses.len();
            }
            Err(_) => {
                tracing::warn!(words = misses.len(), "Batch generation timed out");
                report.failed = misses.len();
            }
        }
        tracing::info!(
            cached = report.cached,
            generated = report.generated,
            failed = report.failed,
            "Variant prefetch finished"
        );
        report
    }

    /// 缓存 -> 单词批量 -> 单词降级
    pub async fn variants_for(
        &self,
        word: &str,
        mix: DifficultyMix,
    ) -> Result<Vec<String>, ContentError> {
        self.resolve_variants(word, mix, true).await
    }

    async fn resolve_variants(
        &self,
        word: &str,
        mix: DifficultyMix,
        try_batch: bool,
    ) -> Result<Vec<String>, ContentError> {
        if let Some(hit) = self.cached_variants(word, mix) {
            return Ok(hit);
        }

        if try_batch {
            let report = self.prefetch_variants(&[word.to_string()], mix).await;
            if report.generated > 0 {
                if let Some(hit) = self.cached_variants(word, mix) {
                    return Ok(hit);
                }
            }
        }

        match tokio::time::timeout(
            self.settings.timeout,
            self.generator.generate_variants_single(word),
        )
        .await
        {
            Ok(Ok(raw)) => {
                let variants = sanitize_variants(word, raw, self.settings.variants_count);
                if !variants.is_empty() {
                    let key = self.variants_key(word, mix);
                    self.store(word, &key, Artifact::Variants(variants.clone()));
                    return Ok(variants);
                }
                tracing::warn!(word, "Single-word generation returned no usable variants");
            }
            Ok(Err(e)) => tracing::warn!(word, error = %e, "Single-word generation failed"),
            Err(_) => tracing::warn!(word, "Single-word generation timed out"),
        }

        Err(ContentError::Unavailable {
            word: word.to_string(),
            kind: ArtifactKind::Variants,
        })
    }

    /// 音频关闭时返回 Ok(None)
    pub async fn audio_for(&self, word: &str) -> Result<Option<Vec<u8>>, ContentError> {
        if !self.settings.audio_enabled {
            return Ok(None);
        }
        let key = self.audio_key(word);
        if let Some(Artifact::Audio(bytes)) = self.cached(word, &key, ArtifactKind::Audio) {
            return Ok(Some(bytes));
        }
        match tokio::time::timeout(self.settings.timeout, self.generator.synthesize_audio(word))
            .await
        {
            Ok(Ok(bytes)) if !bytes.is_empty() => {
                self.store(word, &key, Artifact::Audio(bytes.clone()));
                Ok(Some(bytes))
            }
            Ok(Ok(_)) => {
                tracing::warn!(word, "Speech synthesis returned empty audio");
                Err(ContentError::Unavailable {
                    word: word.to_string(),
                    kind: ArtifactKind::Audio,
                })
            }
            Ok(Err(e)) => {
                tracing::warn!(word, error = %e, "Speech synthesis failed");
                Err(ContentError::Unavailable {
                    word: word.to_string(),
                    kind: ArtifactKind::Audio,
                })
            }
            Err(_) => {
                tracing::warn!(word, "Speech synthesis timed out");
                Err(ContentError::Unavailable {
                    word: word.to_string(),
                    kind: ArtifactKind::Audio,
                })
            }
        }
    }

    /// 组装题目。变体不可用时报错；音频失败只记录日志。
    pub async fn prompt_for(
        &self,
        word: &str,
        mix: DifficultyMix,
    ) -> Result<WordPrompt, ContentError> {
        self.build_prompt(word, mix, true).await
    }

    /// 同一配比的批量生成刚刚试过，未命中时直接走单词降级
    pub async fn prompt_after_prefetch(
        &self,
        word: &str,
        mix: DifficultyMix,
    ) -> Result<WordPrompt, ContentError> {
        self.build_prompt(word, mix, false).await
    }

    async fn build_prompt(
        &self,
        word: &str,
        mix: DifficultyMix,
        try_batch: bool,
    ) -> Result<WordPrompt, ContentError> {
        let variants = self.resolve_variants(word, mix, try_batch).await?;
        let has_audio = match self.audio_for(word).await {
            Ok(audio) => audio.is_some(),
            Err(e) => {
                tracing::warn!(word, error = %e, "Continuing without audio");
                false
            }
        };

        let mut options = Vec::with_capacity(variants.len() + 1);
        options.push(word.to_string());
        options.extend(variants);
        options.shuffle(&mut rand::thread_rng());

        Ok(WordPrompt {
            word: word.to_string(),
            options,
            has_audio,
        })
    }
}
