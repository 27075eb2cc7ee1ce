use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::CHECKPOINT_FORMAT_VERSION;
use crate::learning::session::LearningSession;
use crate::learning::types::{SessionStats, Word};
use crate::store::operations::user_progress::UserProgress;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("checkpoint not found: {session_id}")]
    NotFound { session_id: String },
    #[error("checkpoint {session_id} is corrupt: {reason}")]
    Corrupt { session_id: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 暂停会话的持久化存储契约
pub trait SessionPersistence: Send + Sync {
    /// 原子覆盖写入 (user_id, session_id) 对应的检查点
    fn save(&self, session: &LearningSession) -> Result<(), PersistenceError>;

    /// 读取并校验检查点，返回 Paused 状态的会话
    fn load(&self, user_id: &str, session_id: &str) -> Result<LearningSession, PersistenceError>;

    /// 幂等删除
    fn delete(&self, user_id: &str, session_id: &str) -> Result<(), PersistenceError>;

    fn list(&self, user_id: &str) -> Result<Vec<CheckpointSummary>, PersistenceError>;
}

/// 长期进度存储，会话完成时以读-改-写方式更新
pub trait ProgressStore: Send + Sync {
    fn load_progress(&self, user_id: &str) -> Result<Option<UserProgress>, StoreError>;

    fn update_progress(
        &self,
        user_id: &str,
        apply: &dyn Fn(&mut UserProgress),
    ) -> Result<UserProgress, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordStatsRecord {
    pub consecutive_correct: u32,
    pub total_attempts: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub times_mastered: u32,
    pub is_mastered: bool,
    pub last_attempted_at: Option<DateTime<Utc>>,
}

/// 检查点在存储中的 JSON 形态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub version: u32,
    pub user_id: String,
    pub session_id: String,
    pub dict_id: String,
    pub dict_name: String,
    pub words_list: Vec<String>,
    pub current_word: Option<String>,
    pub stats: SessionStats,
    pub words_stats: BTreeMap<String, WordStatsRecord>,
    pub saved_at: DateTime<Utc>,
}

/// 暂停会话列表项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointSummary {
    pub session_id: String,
    pub dict_id: String,
    pub dict_name: String,
    pub total_words: u32,
    pub words_mastered: u32,
    pub started_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn from_session(session: &LearningSession, saved_at: DateTime<Utc>) -> Self {
        let words_stats = session
            .words()
            .map(|w| {
                (
                    w.text.clone(),
                    WordStatsRecord {
                        consecutive_correct: w.consecutive_correct,
                        total_attempts: w.total_attempts,
                        correct_count: w.correct_count,
                        incorrect_count: w.incorrect_count,
                        times_mastered: w.times_mastered,
                        is_mastered: w.is_mastered,
                        last_attempted_at: w.last_attempted_at,
                    },
                )
            })
            .collect();
        Self {
            version: CHECKPOINT_FORMAT_VERSION,
            user_id: session.user_id().to_string(),
            session_id: session.session_id().to_string(),
            dict_id: session.dict_id().to_string(),
            dict_name: session.dict_name().to_string(),
            words_list: session.words_list().to_vec(),
            current_word: session.current_word().map(|w| w.text.clone()),
            stats: session.stats(),
            words_stats,
            saved_at,
        }
    }

    pub fn summary(&self) -> CheckpointSummary {
        CheckpointSummary {
            session_id: self.session_id.clone(),
            dict_id: self.dict_id.clone(),
            dict_name: self.dict_name.clone(),
            total_words: self.stats.total_words,
            words_mastered: self.stats.words_mastered,
            started_at: self.stats.started_at,
            saved_at: self.saved_at,
        }
    }

    /// 校验记录并重建为 Paused 会话。任何不一致都视为损坏，不做静默修复。
    pub fn into_session(
        self,
        expected_user_id: &str,
        expected_session_id: &str,
    ) -> Result<LearningSession, PersistenceError> {
        let corrupt = |reason: String| PersistenceError::Corrupt {
            session_id: expected_session_id.to_string(),
            reason,
        };

        if self.version != CHECKPOINT_FORMAT_VERSION {
            return Err(corrupt(format!("unsupported format version {}", self.version)));
        }
        if self.session_id != expected_session_id {
            return Err(corrupt(format!("stored session id {}", self.session_id)));
        }
        if self.user_id != expected_user_id {
            return Err(corrupt("stored user id does not match".to_string()));
        }
        if self.words_list.is_empty() {
            return Err(corrupt("empty word list".to_string()));
        }
        let unique: HashSet<&String> = self.words_list.iter().collect();
        if unique.len() != self.words_list.len() {
            return Err(corrupt("duplicate words in word list".to_string()));
        }
        if self.words_stats.len() != unique.len()
            || !self.words_stats.keys().all(|k| unique.contains(k))
        {
            return Err(corrupt("word stats do not match word list".to_string()));
        }

        let mut words = HashMap::with_capacity(self.words_list.len());
        for (text, rec) in self.words_stats {
            if rec.total_attempts != rec.correct_count + rec.incorrect_count {
                return Err(corrupt(format!("inconsistent attempt counts for `{text}`")));
            }
            if rec.consecutive_correct > rec.correct_count {
                return Err(corrupt(format!("streak exceeds correct answers for `{text}`")));
            }
            if rec.is_mastered && rec.times_mastered == 0 {
                return Err(corrupt(format!("`{text}` mastered without mastery count")));
            }
            words.insert(
                text.clone(),
                Word {
                    text,
                    consecutive_correct: rec.consecutive_correct,
                    total_attempts: rec.total_attempts,
                    correct_count: rec.correct_count,
                    incorrect_count: rec.incorrect_count,
                    times_mastered: rec.times_mastered,
                    is_mastered: rec.is_mastered,
                    last_attempted_at: rec.last_attempted_at,
                },
            );
        }

        match self.current_word.as_deref().and_then(|t| words.get(t)) {
            Some(word) if !word.is_mastered => {}
            Some(_) => return Err(corrupt("current word is already mastered".to_string())),
            None => return Err(corrupt("missing or unknown current word".to_string())),
        }

        let ordered = self.words_list.iter().filter_map(|t| words.get(t));
        let recomputed = SessionStats::from_words(ordered, self.stats.started_at, None);
        if !recomputed.same_counts(&self.stats) {
            return Err(corrupt("stored stats disagree with word stats".to_string()));
        }

        Ok(LearningSession::restore(
            self.session_id,
            self.user_id,
            self.dict_id,
            self.dict_name,
            self.words_list,
            words,
            self.current_word,
            self.stats.started_at,
        ))
    }
}

/// 解码原始字节；反序列化失败视为损坏
pub fn decode_record(session_id: &str, bytes: &[u8]) -> Result<SessionRecord, PersistenceError> {
    serde_json::from_slice(bytes).map_err(|e| PersistenceError::Corrupt {
        session_id: session_id.to_string(),
        reason: format!("undecodable record: {e}"),
    })
}
