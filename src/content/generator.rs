use std::collections::HashMap;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::learning::types::DifficultyMix;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation is disabled")]
    Disabled,
    #[error("generation request timed out")]
    Timeout,
    #[error("generation network error: {0}")]
    Network(String),
    #[error("generation api error: status={status}, message={message}")]
    ApiError { status: u16, message: String },
    #[error("generation returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// 外部内容生成器（LLM 变体、TTS 音频）
///
/// 批量接口允许只返回部分单词，缺失的由调用方走单词级降级路径。
pub trait ContentGenerator: Send + Sync {
    fn generate_variants_batch<'a>(
        &'a self,
        words: &'a [String],
        mix: DifficultyMix,
    ) -> BoxFuture<'a, Result<HashMap<String, Vec<String>>, GenerationError>>;

    fn generate_variants_single<'a>(
        &'a self,
        word: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, GenerationError>>;

    fn synthesize_audio<'a>(&'a self, word: &'a str)
        -> BoxFuture<'a, Result<Vec<u8>, GenerationError>>;
}

/// 过滤掉空串、与原词相同（忽略大小写）及重复的变体
pub fn sanitize_variants(word: &str, variants: Vec<String>, limit: usize) -> Vec<String> {
    let target = word.trim().to_lowercase();
    let mut seen = Vec::<String>::new();
    let mut out = Vec::new();
    for variant in variants {
        let trimmed = variant.trim().to_string();
        let lowered = trimmed.to_lowercase();
        if trimmed.is_empty() || lowered == target || seen.contains(&lowered) {
            continue;
        }
        seen.push(lowered);
        out.push(trimmed);
        if out.len() >= limit {
            break;
        }
    }
    out
}
