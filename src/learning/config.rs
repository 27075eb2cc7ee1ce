use serde::{Deserialize, Serialize};

use crate::config::env_or_parse;
use crate::constants::{
    DEFAULT_MASTERY_THRESHOLD, DEFAULT_PERSIST_MAX_RETRIES, DEFAULT_PERSIST_RETRY_BACKOFF_MS,
    DEFAULT_PROGRESS_UPDATE_INTERVAL,
};

/// 调度器打分权重
///
/// score = incorrect * 错误次数 - recency * 新近度加成 - progress * 连续答对
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerWeights {
    pub incorrect: f64,
    pub recency: f64,
    pub progress: f64,
    /// 新近度加成在该窗口（秒）内从 0 线性增长到 1
    pub recency_window_secs: i64,
}

impl Default for SchedulerWeights {
    fn default() -> Self {
        Self {
            incorrect: 10.0,
            recency: 5.0,
            progress: 1.0,
            recency_window_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistencePolicy {
    pub max_write_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for PersistencePolicy {
    fn default() -> Self {
        Self {
            max_write_retries: DEFAULT_PERSIST_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_PERSIST_RETRY_BACKOFF_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningConfig {
    pub mastery_threshold: u32,
    pub weights: SchedulerWeights,
    pub progress_update_interval: u32,
    pub persistence: PersistencePolicy,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            mastery_threshold: DEFAULT_MASTERY_THRESHOLD,
            weights: SchedulerWeights::default(),
            progress_update_interval: DEFAULT_PROGRESS_UPDATE_INTERVAL,
            persistence: PersistencePolicy::default(),
        }
    }
}

impl LearningConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mastery_threshold: env_or_parse("MASTERY_THRESHOLD", defaults.mastery_threshold),
            weights: SchedulerWeights {
                incorrect: env_or_parse("WEIGHT_INCORRECT", defaults.weights.incorrect),
                recency: env_or_parse("WEIGHT_RECENCY", defaults.weights.recency),
                progress: env_or_parse("WEIGHT_PROGRESS", defaults.weights.progress),
                recency_window_secs: env_or_parse(
                    "RECENCY_WINDOW_SECS",
                    defaults.weights.recency_window_secs,
                ),
            },
            progress_update_interval: env_or_parse(
                "PROGRESS_UPDATE_INTERVAL",
                defaults.progress_update_interval,
            ),
            persistence: PersistencePolicy {
                max_write_retries: env_or_parse(
                    "PERSIST_MAX_RETRIES",
                    defaults.persistence.max_write_retries,
                ),
                retry_backoff_ms: env_or_parse(
                    "PERSIST_RETRY_BACKOFF_MS",
                    defaults.persistence.retry_backoff_ms,
                ),
            },
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.mastery_threshold == 0 {
            return Err("mastery_threshold must be >= 1".to_string());
        }
        let w = &self.weights;
        for (name, value) in [
            ("weights.incorrect", w.incorrect),
            ("weights.recency", w.recency),
            ("weights.progress", w.progress),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{name} must be a finite non-negative number"));
            }
        }
        // 错误权重必须压过新近度，否则刚答错的词可能被排在后面
        if w.incorrect <= w.recency {
            return Err("weights.incorrect must be greater than weights.recency".to_string());
        }
        if w.recency_window_secs <= 0 {
            return Err("weights.recency_window_secs must be > 0".to_string());
        }
        if self.progress_update_interval == 0 {
            return Err("progress_update_interval must be >= 1".to_string());
        }
        Ok(())
    }
}
