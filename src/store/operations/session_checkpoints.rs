use chrono::{DateTime, Utc};

use crate::learning::persistence::{
    decode_record, CheckpointSummary, PersistenceError, SessionPersistence, SessionRecord,
};
use crate::learning::session::LearningSession;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    pub fn put_session_checkpoint(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let key = keys::session_checkpoint_key(&record.user_id, &record.session_id)?;
        // sled 单键 insert 是原子的，读者不会看到半写入的记录
        self.session_checkpoints
            .insert(key.as_bytes(), Self::serialize(record)?)?;
        Ok(())
    }

    pub fn get_session_checkpoint_raw(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let key = keys::session_checkpoint_key(user_id, session_id)?;
        Ok(self
            .session_checkpoints
            .get(key.as_bytes())?
            .map(|raw| raw.to_vec()))
    }

    pub fn delete_session_checkpoint(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<bool, StoreError> {
        let key = keys::session_checkpoint_key(user_id, session_id)?;
        Ok(self.session_checkpoints.remove(key.as_bytes())?.is_some())
    }

    /// 删除 saved_at 早于 cutoff 的检查点；无法解析的记录保留，交给 load 报告损坏
    pub fn purge_session_checkpoints_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<usize, StoreError> {
        let mut expired = Vec::new();
        for item in self.session_checkpoints.iter() {
            let (key, value) = item?;
            let saved_at = serde_json::from_slice::<serde_json::Value>(&value)
                .ok()
                .and_then(|v| v.get("savedAt").and_then(|s| s.as_str()).map(str::to_string))
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            if saved_at.is_some_and(|ts| ts < cutoff) {
                expired.push(key);
                if expired.len() >= limit {
                    break;
                }
            }
        }
        for key in &expired {
            self.session_checkpoints.remove(key)?;
        }
        Ok(expired.len())
    }
}

impl SessionPersistence for Store {
    fn save(&self, session: &LearningSession) -> Result<(), PersistenceError> {
        let record = SessionRecord::from_session(session, Utc::now());
        self.put_session_checkpoint(&record)?;
        Ok(())
    }

    fn load(&self, user_id: &str, session_id: &str) -> Result<LearningSession, PersistenceError> {
        let raw = self
            .get_session_checkpoint_raw(user_id, session_id)?
            .ok_or_else(|| PersistenceError::NotFound {
                session_id: session_id.to_string(),
            })?;
        decode_record(session_id, &raw)?.into_session(user_id, session_id)
    }

    fn delete(&self, user_id: &str, session_id: &str) -> Result<(), PersistenceError> {
        self.delete_session_checkpoint(user_id, session_id)?;
        Ok(())
    }

    fn list(&self, user_id: &str) -> Result<Vec<CheckpointSummary>, PersistenceError> {
        let prefix = keys::session_checkpoint_prefix(user_id)?;
        let mut summaries = Vec::new();
        for item in self.session_checkpoints.scan_prefix(prefix.as_bytes()) {
            let (key, value) = item.map_err(StoreError::from)?;
            let session_id = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            match decode_record(&session_id, &value) {
                Ok(record) => summaries.push(record.summary()),
                Err(e) => {
                    tracing::warn!(user_id, session_id, error = %e, "Skipping unreadable checkpoint");
                }
            }
        }
        summaries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn purge_removes_only_expired() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("cp.sled").to_str().unwrap()).unwrap();

        let words = vec!["cat".to_string()];
        let session = LearningSession::new("u1", "d1", "D", &words, Utc::now()).unwrap();
        let now = Utc::now();
        let mut old = SessionRecord::from_session(&session, now - Duration::days(40));
        old.session_id = "old".to_string();
        let mut fresh = SessionRecord::from_session(&session, now);
        fresh.session_id = "fresh".to_string();
        store.put_session_checkpoint(&old).unwrap();
        store.put_session_checkpoint(&fresh).unwrap();

        let removed = store
            .purge_session_checkpoints_before(now - Duration::days(30), 100)
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_session_checkpoint_raw("u1", "old").unwrap().is_none());
        assert!(store.get_session_checkpoint_raw("u1", "fresh").unwrap().is_some());
    }
}
