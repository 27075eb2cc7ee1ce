use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::cache::{Artifact, ArtifactKey, CacheError, CacheStore};
use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    artifact: Artifact,
    created_at: DateTime<Utc>,
}

impl Store {
    pub fn artifact_cache_len(&self) -> usize {
        self.artifact_cache.len()
    }
}

impl CacheStore for Store {
    fn get(&self, key: &ArtifactKey) -> Result<Option<Artifact>, CacheError> {
        let raw_key = keys::artifact_key(key.as_str());
        let Some(raw) = self
            .artifact_cache
            .get(raw_key.as_bytes())
            .map_err(StoreError::from)?
        else {
            return Ok(None);
        };
        let entry: CacheEntry =
            Self::deserialize(&raw).map_err(|e| CacheError::Corrupt {
                key: raw_key,
                reason: e.to_string(),
            })?;
        Ok(Some(entry.artifact))
    }

    fn put(&self, key: &ArtifactKey, artifact: &Artifact) -> Result<(), CacheError> {
        let raw_key = keys::artifact_key(key.as_str());
        let entry = CacheEntry {
            artifact: artifact.clone(),
            created_at: Utc::now(),
        };
        self.artifact_cache
            .insert(raw_key.as_bytes(), Self::serialize(&entry)?)
            .map_err(StoreError::from)?;
        Ok(())
    }
}
