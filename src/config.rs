use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use std::fmt;

use crate::constants::{DEFAULT_CHECKPOINT_TTL_DAYS, DEFAULT_VARIANTS_COUNT};
use crate::learning::config::LearningConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub cors_origin: String,
    pub worker: WorkerConfig,
    pub learning: LearningConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
    pub checkpoint_ttl_days: i64,
}

/// 外部内容生成（错误拼写变体 + TTS 音频）的配置
#[derive(Clone)]
pub struct GenerationConfig {
    pub enabled: bool,
    pub mock: bool,
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub tts_api_url: String,
    pub tts_voice: String,
    pub audio_enabled: bool,
    pub timeout_secs: u64,
    pub config_version: String,
    pub variants_count: usize,
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("enabled", &self.enabled)
            .field("mock", &self.mock)
            .field("api_url", &self.api_url)
            .field("api_key", &"***REDACTED***")
            .field("model", &self.model)
            .field("tts_api_url", &self.tts_api_url)
            .field("tts_voice", &self.tts_voice)
            .field("audio_enabled", &self.audio_enabled)
            .field("timeout_secs", &self.timeout_secs)
            .field("config_version", &self.config_version)
            .field("variants_count", &self.variants_count)
            .finish()
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mock: true,
            api_url: String::new(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            tts_api_url: String::new(),
            tts_voice: "alloy".to_string(),
            audio_enabled: false,
            timeout_secs: 30,
            config_version: "v1".to_string(),
            variants_count: DEFAULT_VARIANTS_COUNT,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            log_json: env_or_bool("LOG_JSON", false),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/trainer.sled"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
                checkpoint_ttl_days: env_or_parse(
                    "CHECKPOINT_TTL_DAYS",
                    DEFAULT_CHECKPOINT_TTL_DAYS,
                ),
            },
            learning: LearningConfig::from_env(),
            generation: GenerationConfig {
                enabled: env_or_bool("GENERATION_ENABLED", false),
                mock: env_or_bool("GENERATION_MOCK", true),
                api_url: env_or("LLM_API_URL", ""),
                api_key: env_or("LLM_API_KEY", ""),
                model: env_or("LLM_MODEL", "gpt-4o-mini"),
                tts_api_url: env_or("TTS_API_URL", ""),
                tts_voice: env_or("TTS_VOICE", "alloy"),
                audio_enabled: env_or_bool("AUDIO_ENABLED", false),
                timeout_secs: env_or_parse("GENERATION_TIMEOUT_SECS", 30_u64),
                config_version: env_or("GENERATION_CONFIG_VERSION", "v1"),
                variants_count: env_or_parse("VARIANTS_COUNT", DEFAULT_VARIANTS_COUNT),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn managed_keys() -> &'static [&'static str] {
        &[
            "HOST",
            "PORT",
            "RUST_LOG",
            "MASTERY_THRESHOLD",
            "WEIGHT_INCORRECT",
            "GENERATION_ENABLED",
            "GENERATION_MOCK",
            "GENERATION_TIMEOUT_SECS",
            "LLM_API_KEY",
            "VARIANTS_COUNT",
        ]
    }

    fn clear_keys(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_when_missing() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.learning.mastery_threshold, 3);
        assert_eq!(cfg.generation.variants_count, 3);
        assert!(!cfg.generation.enabled);
        assert!(cfg.generation.mock);
    }

    #[test]
    fn parses_numeric_values() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "4000");
        env::set_var("MASTERY_THRESHOLD", "5");
        env::set_var("GENERATION_TIMEOUT_SECS", "42");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.learning.mastery_threshold, 5);
        assert_eq!(cfg.generation.timeout_secs, 42);
    }

    #[test]
    fn invalid_values_fall_back() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "bad");
        env::set_var("WEIGHT_INCORRECT", "x");
        env::set_var("VARIANTS_COUNT", "-1");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.learning.weights.incorrect, 10.0);
        assert_eq!(cfg.generation.variants_count, 3);
    }

    #[test]
    fn generation_flags_isolation() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("GENERATION_ENABLED", "true");
        env::set_var("GENERATION_MOCK", "false");

        let cfg = Config::from_env();
        assert!(cfg.generation.enabled);
        assert!(!cfg.generation.mock);
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("LLM_API_KEY", "sk-secret-value");
        let cfg = Config::from_env();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("sk-secret-value"));
        assert!(rendered.contains("***REDACTED***"));
    }
}
