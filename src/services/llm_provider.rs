use std::collections::HashMap;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::content::generator::{sanitize_variants, ContentGenerator, GenerationError};
use crate::content::misspell::MisspellingGenerator;
use crate::learning::types::DifficultyMix;

const SYSTEM_PROMPT: &str = "You generate plausible misspellings for spelling practice. \
Each misspelling must differ from the correct word, keep the same alphabet and look like \
a real learner mistake. Answer with JSON only.";

/// OpenAI 兼容的 chat / speech 接口。
///
/// 未启用或 mock 模式下错误拼写由离线生成器产出，单词级降级路径在 API 失败时也会回落到离线生成。
#[derive(Debug, Clone)]
pub struct LlmProvider {
    config: GenerationConfig,
    client: reqwest::Client,
    offline: MisspellingGenerator,
}

impl LlmProvider {
    pub fn new(config: &GenerationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config: config.clone(),
            client,
            offline: MisspellingGenerator::new(config.variants_count),
        }
    }

    /// 启动时校验：真实模式必须配置 API 地址
    pub fn validate_config(config: &GenerationConfig) -> Result<(), String> {
        if config.variants_count == 0 {
            return Err("VARIANTS_COUNT must be >= 1".to_string());
        }
        if config.enabled && !config.mock && config.api_url.trim().is_empty() {
            return Err(
                "GENERATION_ENABLED=true and GENERATION_MOCK=false require LLM_API_URL".to_string(),
            );
        }
        if config.audio_enabled && !config.mock && config.tts_api_url.trim().is_empty() {
            return Err("AUDIO_ENABLED=true requires TTS_API_URL unless in mock mode".to_string());
        }
        Ok(())
    }

    fn uses_api(&self) -> bool {
        self.config.enabled && !self.config.mock
    }

    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, GenerationError> {
        if !self.config.enabled {
            return Err(GenerationError::Disabled);
        }
        if self.config.mock {
            return Ok("{}".to_string());
        }

        let url = format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: 0.7,
        };
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GenerationError::ApiError {
                status: status.as_u16(),
                message: truncate(&message, 200),
            });
        }
        let parsed: ChatResponse = resp.json().await.map_err(map_reqwest_error)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GenerationError::InvalidResponse("no choices".to_string()))
    }

    async fn request_batch(
        &self,
        words: &[String],
        mix: DifficultyMix,
    ) -> Result<HashMap<String, Vec<String>>, GenerationError> {
        let prompt = format!(
            "For each word produce exactly {count} misspellings: {easy} easy, {medium} medium, \
             {hard} hard. Return a JSON object mapping every word to an array of strings.\nWords: {list}",
            count = self.config.variants_count,
            easy = mix.easy,
            medium = mix.medium,
            hard = mix.hard,
            list = serde_json::to_string(words).unwrap_or_default(),
        );
        let text = self
            .chat(vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)])
            .await?;
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(extract_json(&text, '{', '}')?)
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let mut batch = HashMap::new();
        for word in words {
            let Some(candidates) = raw.get(word) else {
                tracing::warn!(word = %word, "Word missing from batch response");
                continue;
            };
            let variants = sanitize_variants(word, candidates.clone(), self.config.variants_count);
            if variants.len() == self.config.variants_count {
                batch.insert(word.clone(), variants);
            } else {
                tracing::warn!(word = %word, got = variants.len(), "Batch variants failed validation");
            }
        }
        Ok(batch)
    }

    async fn request_single(&self, word: &str) -> Result<Vec<String>, GenerationError> {
        let prompt = format!(
            "Produce exactly {} misspellings of the word \"{}\". Return a JSON array of strings.",
            self.config.variants_count, word
        );
        let text = self
            .chat(vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)])
            .await?;
        let raw: Vec<String> = serde_json::from_str(extract_json(&text, '[', ']')?)
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        let variants = sanitize_variants(word, raw, self.config.variants_count);
        if variants.len() < self.config.variants_count {
            return Err(GenerationError::InvalidResponse(format!(
                "expected {} variants, got {}",
                self.config.variants_count,
                variants.len()
            )));
        }
        Ok(variants)
    }

    async fn request_speech(&self, word: &str) -> Result<Vec<u8>, GenerationError> {
        if !self.config.audio_enabled {
            return Err(GenerationError::Disabled);
        }
        if self.config.mock {
            return Ok(format!("MOCK-AUDIO:{word}").into_bytes());
        }
        let url = format!("{}/audio/speech", self.config.tts_api_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&SpeechRequest {
                model: "tts-1",
                voice: &self.config.tts_voice,
                input: word,
            })
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GenerationError::ApiError {
                status: status.as_u16(),
                message: "speech synthesis failed".to_string(),
            });
        }
        let bytes = resp.bytes().await.map_err(map_reqwest_error)?;
        if bytes.is_empty() {
            return Err(GenerationError::InvalidResponse("empty audio".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

impl ContentGenerator for LlmProvider {
    fn generate_variants_batch<'a>(
        &'a self,
        words: &'a [String],
        mix: DifficultyMix,
    ) -> BoxFuture<'a, Result<HashMap<String, Vec<String>>, GenerationError>> {
        async move {
            if !self.uses_api() {
                return self.offline.generate_variants_batch(words, mix).await;
            }
            self.request_batch(words, mix).await
        }
        .boxed()
    }

    fn generate_variants_single<'a>(
        &'a self,
        word: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, GenerationError>> {
        async move {
            if self.uses_api() {
                // 给离线回落留出时间
                let budget = Duration::from_secs(self.config.timeout_secs.max(2) / 2);
                match tokio::time::timeout(budget, self.request_single(word)).await {
                    Ok(Ok(variants)) => return Ok(variants),
                    Ok(Err(e)) => {
                        tracing::warn!(word, error = %e, "Single-word generation failed, using offline variants");
                    }
                    Err(_) => {
                        tracing::warn!(word, "Single-word generation timed out, using offline variants");
                    }
                }
            }
            self.offline.generate(word)
        }
        .boxed()
    }

    fn synthesize_audio<'a>(
        &'a self,
        word: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, GenerationError>> {
        self.request_speech(word).boxed()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
}

fn map_reqwest_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Network(e.to_string())
    }
}

/// 模型常在 JSON 外包裹说明文字或代码块，截取首尾括号之间的部分
fn extract_json(text: &str, open: char, close: char) -> Result<&str, GenerationError> {
    match (text.find(open), text.rfind(close)) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(GenerationError::InvalidResponse(
            "no JSON found in response".to_string(),
        )),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
