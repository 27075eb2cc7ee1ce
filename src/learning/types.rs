use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 会话内单个单词的学习状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub text: String,
    pub consecutive_correct: u32,
    pub total_attempts: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub times_mastered: u32,
    pub is_mastered: bool,
    pub last_attempted_at: Option<DateTime<Utc>>,
}

impl Word {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            consecutive_correct: 0,
            total_attempts: 0,
            correct_count: 0,
            incorrect_count: 0,
            times_mastered: 0,
            is_mastered: false,
            last_attempted_at: None,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.incorrect_count > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Incorrect,
}

impl Outcome {
    pub fn from_correct(correct: bool) -> Self {
        if correct {
            Self::Correct
        } else {
            Self::Incorrect
        }
    }

    pub fn is_correct(self) -> bool {
        matches!(self, Self::Correct)
    }
}

/// 会话统计，始终可由 Word 集合重新计算
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_words: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub words_mastered: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionStats {
    pub fn from_words<'a, I>(words: I, started_at: DateTime<Utc>, ended_at: Option<DateTime<Utc>>) -> Self
    where
        I: IntoIterator<Item = &'a Word>,
    {
        let mut stats = Self {
            total_words: 0,
            correct_answers: 0,
            incorrect_answers: 0,
            words_mastered: 0,
            started_at,
            ended_at,
        };
        for word in words {
            stats.total_words += 1;
            stats.correct_answers += word.correct_count;
            stats.incorrect_answers += word.incorrect_count;
            if word.is_mastered {
                stats.words_mastered += 1;
            }
        }
        stats
    }

    pub fn total_answers(&self) -> u32 {
        self.correct_answers + self.incorrect_answers
    }

    /// 正确率（百分比），无作答时为 0
    pub fn success_rate(&self) -> f64 {
        let total = self.total_answers();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.correct_answers) / f64::from(total) * 100.0
    }

    pub fn duration_secs(&self, now: DateTime<Utc>) -> i64 {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).num_seconds().max(0)
    }

    /// 计数部分是否一致（忽略时间戳）
    pub fn same_counts(&self, other: &Self) -> bool {
        self.total_words == other.total_words
            && self.correct_answers == other.correct_answers
            && self.incorrect_answers == other.incorrect_answers
            && self.words_mastered == other.words_mastered
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub mastered: u32,
    pub total: u32,
    pub remaining: u32,
    pub with_errors: u32,
    pub without_errors: u32,
}

impl SessionProgress {
    pub fn from_words<'a, I>(words: I) -> Self
    where
        I: IntoIterator<Item = &'a Word>,
    {
        let mut progress = Self {
            mastered: 0,
            total: 0,
            remaining: 0,
            with_errors: 0,
            without_errors: 0,
        };
        for word in words {
            progress.total += 1;
            if word.is_mastered {
                progress.mastered += 1;
            } else {
                progress.remaining += 1;
            }
            if word.has_errors() {
                progress.with_errors += 1;
            } else if word.total_attempts > 0 {
                progress.without_errors += 1;
            }
        }
        progress
    }
}

/// 生成错误拼写时的难度配比
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyMix {
    pub easy: u8,
    pub medium: u8,
    pub hard: u8,
}

impl DifficultyMix {
    /// 错得越多，干扰项越容易辨认
    pub fn for_incorrect_count(incorrect: u32) -> Self {
        match incorrect {
            0 => Self { easy: 0, medium: 0, hard: 3 },
            1..=2 => Self { easy: 0, medium: 1, hard: 2 },
            _ => Self { easy: 1, medium: 2, hard: 0 },
        }
    }
}

impl Default for DifficultyMix {
    fn default() -> Self {
        Self::for_incorrect_count(0)
    }
}

/// 首字母大写、其余小写
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// 比较用的规范形式：去空白 + 小写
pub fn normalize_answer(text: &str) -> String {
    text.trim().to_lowercase()
}
