use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{COMPLETED_SESSION_HISTORY, MAX_CAS_RETRIES};
use crate::learning::persistence::ProgressStore;
use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordProgress {
    pub word: String,
    pub total_correct: u64,
    pub total_incorrect: u64,
    pub times_mastered: u32,
    pub last_attempted_at: Option<DateTime<Utc>>,
}

impl WordProgress {
    pub fn new(word: &str) -> Self {
        Self {
            word: word.to_string(),
            total_correct: 0,
            total_incorrect: 0,
            times_mastered: 0,
            last_attempted_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryProgress {
    pub dict_id: String,
    pub dict_name: String,
    pub sessions_completed: u32,
    pub words: BTreeMap<String, WordProgress>,
    pub last_session_at: Option<DateTime<Utc>>,
}

impl DictionaryProgress {
    pub fn new(dict_id: &str, dict_name: &str) -> Self {
        Self {
            dict_id: dict_id.to_string(),
            dict_name: dict_name.to_string(),
            sessions_completed: 0,
            words: BTreeMap::new(),
            last_session_at: None,
        }
    }
}

/// 跨会话的长期学习进度，仅在会话完成时更新
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: String,
    pub total_sessions: u32,
    pub total_words_learned: u32,
    pub total_attempts: u64,
    pub total_correct: u64,
    pub total_incorrect: u64,
    pub dictionaries: BTreeMap<String, DictionaryProgress>,
    pub last_activity: Option<DateTime<Utc>>,
    /// 最近已计入进度的会话 id，同一会话只合并一次
    #[serde(default)]
    pub completed_sessions: VecDeque<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProgress {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_sessions: 0,
            total_words_learned: 0,
            total_attempts: 0,
            total_correct: 0,
            total_incorrect: 0,
            dictionaries: BTreeMap::new(),
            last_activity: None,
            completed_sessions: VecDeque::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_completed(&self, session_id: &str) -> bool {
        self.completed_sessions.iter().any(|id| id == session_id)
    }

    pub fn record_completed(&mut self, session_id: &str) {
        self.completed_sessions.push_back(session_id.to_string());
        while self.completed_sessions.len() > COMPLETED_SESSION_HISTORY {
            self.completed_sessions.pop_front();
        }
    }
}

impl Store {
    pub fn get_user_progress(&self, user_id: &str) -> Result<Option<UserProgress>, StoreError> {
        let key = keys::user_progress_key(user_id)?;
        match self.user_progress.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// 读取-修改-CAS 写回，冲突时重试。`apply` 每次重试都会作用在最新副本上。
    pub fn update_user_progress<F>(&self, user_id: &str, apply: F) -> Result<UserProgress, StoreError>
    where
        F: Fn(&mut UserProgress),
    {
        let key = keys::user_progress_key(user_id)?;
        for _ in 0..MAX_CAS_RETRIES {
            let current = self.user_progress.get(key.as_bytes())?;
            let mut progress = match &current {
                Some(raw) => Self::deserialize::<UserProgress>(raw)?,
                None => UserProgress::new(user_id, Utc::now()),
            };
            apply(&mut progress);
            progress.updated_at = Utc::now();
            let next = Self::serialize(&progress)?;

            let swapped = self
                .user_progress
                .compare_and_swap(key.as_bytes(), current, Some(next))?;
            match swapped {
                Ok(()) => return Ok(progress),
                Err(_) => {
                    tracing::debug!(user_id, "User progress CAS conflict, retrying");
                    continue;
                }
            }
        }
        Err(StoreError::CasRetryExhausted {
            entity: "user_progress".to_string(),
            key,
            attempts: MAX_CAS_RETRIES,
        })
    }
}

impl ProgressStore for Store {
    fn load_progress(&self, user_id: &str) -> Result<Option<UserProgress>, StoreError> {
        self.get_user_progress(user_id)
    }

    fn update_progress(
        &self,
        user_id: &str,
        apply: &dyn Fn(&mut UserProgress),
    ) -> Result<UserProgress, StoreError> {
        self.update_user_progress(user_id, apply)
    }
}
