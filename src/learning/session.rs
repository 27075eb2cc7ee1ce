use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::learning::error::SessionError;
use crate::learning::scheduler::PriorityScheduler;
use crate::learning::tracker::ProgressTracker;
use crate::learning::types::{normalize_answer, Outcome, SessionProgress, SessionStats, Word};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Initializing,
    Active,
    Paused,
    Completed,
    Aborted,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    SubmitAnswer,
    Pause,
    Resume,
    Abort,
}

impl SessionEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::SubmitAnswer => "submit_answer",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次作答的反馈
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFeedback {
    pub word: String,
    pub chosen: String,
    pub correct: bool,
    pub consecutive_correct: u32,
    pub newly_mastered: bool,
    pub completed: bool,
}

/// 单个学习者在单个词典上的一次练习。
///
/// 不变量：
/// - Active 状态下 current_word 一定指向未掌握的单词；
/// - 统计信息随时可由 words 重新计算；
/// - 终态（Completed / Aborted）不再接受任何事件。
#[derive(Debug, Clone)]
pub struct LearningSession {
    session_id: String,
    user_id: String,
    dict_id: String,
    dict_name: String,
    words_list: Vec<String>,
    words: HashMap<String, Word>,
    current_word: Option<String>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    state: SessionState,
}

impl LearningSession {
    pub fn new(
        user_id: &str,
        dict_id: &str,
        dict_name: &str,
        words: &[String],
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let mut words_list: Vec<String> = Vec::with_capacity(words.len());
        let mut map = HashMap::with_capacity(words.len());
        for text in words {
            if !map.contains_key(text) {
                map.insert(text.clone(), Word::new(text.clone()));
                words_list.push(text.clone());
            }
        }
        if words_list.is_empty() {
            return Err(SessionError::EmptyDictionary {
                dict_id: dict_id.to_string(),
            });
        }
        Ok(Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            dict_id: dict_id.to_string(),
            dict_name: dict_name.to_string(),
            words_list,
            words: map,
            current_word: None,
            started_at: now,
            ended_at: None,
            state: SessionState::Initializing,
        })
    }

    /// 从检查点恢复，调用方负责校验
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        session_id: String,
        user_id: String,
        dict_id: String,
        dict_name: String,
        words_list: Vec<String>,
        words: HashMap<String, Word>,
        current_word: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            user_id,
            dict_id,
            dict_name,
            words_list,
            words,
            current_word,
            started_at,
            ended_at: None,
            state: SessionState::Paused,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn dict_id(&self) -> &str {
        &self.dict_id
    }

    pub fn dict_name(&self) -> &str {
        &self.dict_name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn words_list(&self) -> &[String] {
        &self.words_list
    }

    pub fn word(&self, text: &str) -> Option<&Word> {
        self.words.get(text)
    }

    /// 按词典顺序遍历
    pub fn words(&self) -> impl Iterator<Item = &Word> + '_ {
        self.words_list.iter().filter_map(|t| self.words.get(t))
    }

    pub fn current_word(&self) -> Option<&Word> {
        self.current_word.as_deref().and_then(|t| self.words.get(t))
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats::from_words(self.words(), self.started_at, self.ended_at)
    }

    pub fn progress(&self) -> SessionProgress {
        SessionProgress::from_words(self.words())
    }

    pub fn mastered_words(&self) -> Vec<&str> {
        self.words()
            .filter(|w| w.is_mastered)
            .map(|w| w.text.as_str())
            .collect()
    }

    pub fn total_answers(&self) -> u32 {
        self.words().map(|w| w.total_attempts).sum()
    }

    /// 每答满 interval 题提示一次阶段进度
    pub fn should_show_progress_update(&self, interval: u32) -> bool {
        let answers = self.total_answers();
        interval > 0 && answers > 0 && answers % interval == 0
    }

    fn invalid(&self, event: SessionEvent) -> SessionError {
        SessionError::InvalidTransition {
            from: Some(self.state),
            event,
        }
    }

    pub fn start(&mut self, scheduler: &PriorityScheduler) -> Result<&Word, SessionError> {
        if self.state != SessionState::Initializing {
            return Err(self.invalid(SessionEvent::Start));
        }
        let first = scheduler
            .select_next(self.words())
            .map(|w| w.text.clone())
            .ok_or_else(|| SessionError::EmptyDictionary {
                dict_id: self.dict_id.clone(),
            })?;
        self.state = SessionState::Active;
        self.current_word = Some(first);
        self.current_word()
            .ok_or_else(|| self.invalid(SessionEvent::Start))
    }

    pub fn submit_answer(
        &mut self,
        choice: &str,
        scheduler: &PriorityScheduler,
        tracker: &ProgressTracker,
        now: DateTime<Utc>,
    ) -> Result<AnswerFeedback, SessionError> {
        if self.state != SessionState::Active {
            return Err(self.invalid(SessionEvent::SubmitAnswer));
        }
        let Some(current) = self.current_word().cloned() else {
            return Err(self.invalid(SessionEvent::SubmitAnswer));
        };

        let correct = normalize_answer(choice) == normalize_answer(&current.text);
        let updated = tracker.record(&current, Outcome::from_correct(correct), now);
        let newly_mastered = updated.is_mastered && !current.is_mastered;
        let consecutive_correct = updated.consecutive_correct;
        self.words.insert(current.text.clone(), updated);

        let next = scheduler.select_next(self.words()).map(|w| w.text.clone());
        let completed = next.is_none();
        self.current_word = next;
        if completed {
            self.state = SessionState::Completed;
            self.ended_at = Some(now);
        }

        Ok(AnswerFeedback {
            word: current.text,
            chosen: choice.trim().to_string(),
            correct,
            consecutive_correct,
            newly_mastered,
            completed,
        })
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Active {
            return Err(self.invalid(SessionEvent::Pause));
        }
        self.state = SessionState::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Paused {
            return Err(self.invalid(SessionEvent::Resume));
        }
        self.state = SessionState::Active;
        Ok(())
    }

    pub fn abort(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        if !matches!(self.state, SessionState::Active | SessionState::Paused) {
            return Err(self.invalid(SessionEvent::Abort));
        }
        self.state = SessionState::Aborted;
        self.current_word = None;
        self.ended_at = Some(now);
        Ok(())
    }
}
