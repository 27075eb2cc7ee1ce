use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::learning::session::LearningSession;
use crate::learning::types::{Outcome, Word};
use crate::store::operations::dictionaries::Dictionary;
use crate::store::operations::user_progress::{DictionaryProgress, UserProgress, WordProgress};

/// 掌握度规则与跨会话进度聚合。纯函数，不做 IO。
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    mastery_threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryProgressSummary {
    pub dict_id: String,
    pub dict_name: String,
    pub total_words: u32,
    pub mastered_words: u32,
    pub words_with_errors: u32,
    pub total_correct: u64,
    pub total_incorrect: u64,
    pub success_rate: f64,
    pub sessions_completed: u32,
    pub last_session_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalProgressSummary {
    pub total_sessions: u32,
    pub total_words_learned: u32,
    pub total_attempts: u64,
    pub total_correct: u64,
    pub total_incorrect: u64,
    pub success_rate: f64,
    /// 各词典已掌握单词数之和 / 单词总数之和（百分比）
    pub mastered_ratio: f64,
    pub dictionaries: Vec<DictionaryProgressSummary>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl ProgressTracker {
    pub fn new(mastery_threshold: u32) -> Self {
        Self {
            mastery_threshold: mastery_threshold.max(1),
        }
    }

    pub fn mastery_threshold(&self) -> u32 {
        self.mastery_threshold
    }

    /// 记录一次作答，返回新的 Word。
    ///
    /// 答错清零连续计数；连续答对达到阈值时置为已掌握并累加 timesMastered。
    /// 已掌握状态在会话内不可撤销。
    pub fn record(&self, word: &Word, outcome: Outcome, now: DateTime<Utc>) -> Word {
        let mut next = word.clone();
        next.total_attempts += 1;
        next.last_attempted_at = Some(now);
        match outcome {
            Outcome::Correct => {
                next.correct_count += 1;
                next.consecutive_correct += 1;
            }
            Outcome::Incorrect => {
                next.incorrect_count += 1;
                next.consecutive_correct = 0;
            }
        }
        if !next.is_mastered && next.consecutive_correct >= self.mastery_threshold {
            next.is_mastered = true;
            next.times_mastered += 1;
        }
        next
    }

    /// 会话完成时把会话结果合并进用户长期进度。
    ///
    /// 已记录过的会话不再合并，返回 false。
    pub fn apply_completed_session(
        &self,
        progress: &mut UserProgress,
        session: &LearningSession,
        now: DateTime<Utc>,
    ) -> bool {
        if progress.has_completed(session.session_id()) {
            return false;
        }
        progress.record_completed(session.session_id());
        let dict = progress
            .dictionaries
            .entry(session.dict_id().to_string())
            .or_insert_with(|| DictionaryProgress::new(session.dict_id(), session.dict_name()));
        dict.dict_name = session.dict_name().to_string();
        dict.sessions_completed += 1;
        dict.last_session_at = Some(now);

        let mut newly_learned = 0;
        let mut correct = 0_u64;
        let mut incorrect = 0_u64;
        for word in session.words() {
            let entry = dict
                .words
                .entry(word.text.clone())
                .or_insert_with(|| WordProgress::new(&word.text));
            let was_learned = entry.times_mastered > 0;
            entry.total_correct += u64::from(word.correct_count);
            entry.total_incorrect += u64::from(word.incorrect_count);
            entry.times_mastered += word.times_mastered;
            if word.last_attempted_at > entry.last_attempted_at {
                entry.last_attempted_at = word.last_attempted_at;
            }
            if !was_learned && entry.times_mastered > 0 {
                newly_learned += 1;
            }
            correct += u64::from(word.correct_count);
            incorrect += u64::from(word.incorrect_count);
        }

        progress.total_sessions += 1;
        progress.total_words_learned += newly_learned;
        progress.total_correct += correct;
        progress.total_incorrect += incorrect;
        progress.total_attempts += correct + incorrect;
        progress.last_activity = Some(now);
        true
    }

    pub fn dictionary_summary(
        &self,
        progress: &UserProgress,
        dict_id: &str,
    ) -> Option<DictionaryProgressSummary> {
        progress.dictionaries.get(dict_id).map(summarize_dictionary)
    }

    pub fn total_summary(&self, progress: &UserProgress) -> TotalProgressSummary {
        let dictionaries: Vec<DictionaryProgressSummary> = progress
            .dictionaries
            .values()
            .map(summarize_dictionary)
            .collect();
        let mastered: u64 = dictionaries.iter().map(|d| u64::from(d.mastered_words)).sum();
        let total: u64 = dictionaries.iter().map(|d| u64::from(d.total_words)).sum();
        TotalProgressSummary {
            total_sessions: progress.total_sessions,
            total_words_learned: progress.total_words_learned,
            total_attempts: progress.total_attempts,
            total_correct: progress.total_correct,
            total_incorrect: progress.total_incorrect,
            success_rate: percentage(progress.total_correct, progress.total_attempts),
            mastered_ratio: percentage(mastered, total),
            dictionaries,
            last_activity: progress.last_activity,
        }
    }

    /// 词典中每个词都至少掌握过一次
    pub fn is_dictionary_learned(&self, progress: &UserProgress, dictionary: &Dictionary) -> bool {
        let Some(dict) = progress.dictionaries.get(&dictionary.id) else {
            return false;
        };
        !dictionary.words.is_empty()
            && dictionary.words.iter().all(|w| {
                dict.words
                    .get(w)
                    .is_some_and(|p| p.times_mastered > 0)
            })
    }
}

fn summarize_dictionary(dict: &DictionaryProgress) -> DictionaryProgressSummary {
    let mut summary = DictionaryProgressSummary {
        dict_id: dict.dict_id.clone(),
        dict_name: dict.dict_name.clone(),
        total_words: 0,
        mastered_words: 0,
        words_with_errors: 0,
        total_correct: 0,
        total_incorrect: 0,
        success_rate: 0.0,
        sessions_completed: dict.sessions_completed,
        last_session_at: dict.last_session_at,
    };
    for word in dict.words.values() {
        summary.total_words += 1;
        if word.times_mastered > 0 {
            summary.mastered_words += 1;
        }
        if word.total_incorrect > 0 {
            summary.words_with_errors += 1;
        }
        summary.total_correct += word.total_correct;
        summary.total_incorrect += word.total_incorrect;
    }
    summary.success_rate = percentage(
        summary.total_correct,
        summary.total_correct + summary.total_incorrect,
    );
    summary
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
