use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::learning::types::normalize_answer;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Variants,
    Audio,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Variants => "variants",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 内容寻址的缓存键：sha256(规范化单词, 类型, 生成配置版本)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    pub fn new(word: &str, kind: ArtifactKind, config_version: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize_answer(word).as_bytes());
        hasher.update([0x1f]);
        hasher.update(kind.as_str().as_bytes());
        hasher.update([0x1f]);
        hasher.update(config_version.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum Artifact {
    Variants(Vec<String>),
    Audio(#[serde(with = "hex_bytes")] Vec<u8>),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Variants(_) => ArtifactKind::Variants,
            Self::Audio(_) => ArtifactKind::Audio,
        }
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        hex::decode(raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("cache entry {key} is unreadable: {reason}")]
    Corrupt { key: String, reason: String },
}

/// 生成结果缓存。写入后同一键永远返回相同内容，重复写入覆盖即可。
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &ArtifactKey) -> Result<Option<Artifact>, CacheError>;
    fn put(&self, key: &ArtifactKey, artifact: &Artifact) -> Result<(), CacheError>;
}

/// 进程内缓存，测试与无持久化场景使用
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<ArtifactKey, Artifact>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &ArtifactKey) -> Result<Option<Artifact>, CacheError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &ArtifactKey, artifact: &Artifact) -> Result<(), CacheError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.clone(), artifact.clone());
        Ok(())
    }
}
