use chrono::{DateTime, Utc};

use crate::learning::config::SchedulerWeights;
use crate::learning::types::Word;

/// 优先级调度器：从未掌握的单词中挑出下一个要练习的。
///
/// 打分只依赖 Word 集合本身（新近度以集合中最近一次作答为基准），
/// 相同输入必然得到相同输出；同分时按词典顺序取第一个。
#[derive(Debug, Clone)]
pub struct PriorityScheduler {
    weights: SchedulerWeights,
}

impl PriorityScheduler {
    pub fn new(weights: SchedulerWeights) -> Self {
        Self { weights }
    }

    /// 返回 None 表示所有单词均已掌握
    pub fn select_next<'a, I>(&self, words: I) -> Option<&'a Word>
    where
        I: IntoIterator<Item = &'a Word>,
    {
        let words: Vec<&Word> = words.into_iter().collect();
        let newest = words.iter().filter_map(|w| w.last_attempted_at).max();

        let mut best: Option<(&Word, f64)> = None;
        for word in words.into_iter().filter(|w| !w.is_mastered) {
            let score = self.score(word, newest);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((word, score)),
            }
        }
        best.map(|(word, _)| word)
    }

    pub fn score(&self, word: &Word, newest: Option<DateTime<Utc>>) -> f64 {
        let w = &self.weights;
        w.incorrect * f64::from(word.incorrect_count)
            - w.recency * self.recency_bonus(word.last_attempted_at, newest)
            - w.progress * f64::from(word.consecutive_correct)
    }

    /// 0 表示刚刚作答过，1 表示超出窗口或从未作答
    pub fn recency_bonus(
        &self,
        last_attempted_at: Option<DateTime<Utc>>,
        newest: Option<DateTime<Utc>>,
    ) -> f64 {
        let (Some(last), Some(newest)) = (last_attempted_at, newest) else {
            return 1.0;
        };
        let age_secs = (newest - last).num_milliseconds() as f64 / 1000.0;
        let window = self.weights.recency_window_secs.max(1) as f64;
        (age_secs / window).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn scheduler() -> PriorityScheduler {
        PriorityScheduler::new(SchedulerWeights::default())
    }

    #[test]
    fn empty_or_all_mastered_yields_none() {
        let s = scheduler();
        assert!(s.select_next(std::iter::empty::<&Word>()).is_none());

        let mut w = Word::new("cat");
        w.is_mastered = true;
        w.times_mastered = 1;
        assert!(s.select_next([&w]).is_none());
    }

    #[test]
    fn fresh_words_tie_break_on_order() {
        let s = scheduler();
        let words = [Word::new("cat"), Word::new("dog"), Word::new("fox")];
        assert_eq!(s.select_next(words.iter()).unwrap().text, "cat");
    }

    #[test]
    fn skips_mastered_words() {
        let s = scheduler();
        let mut cat = Word::new("cat");
        cat.is_mastered = true;
        cat.times_mastered = 1;
        let words = [cat, Word::new("dog")];
        assert_eq!(s.select_next(words.iter()).unwrap().text, "dog");
    }

    #[test]
    fn errors_outrank_fresh_words() {
        let s = scheduler();
        let now = Utc::now();
        let mut cat = Word::new("cat");
        cat.incorrect_count = 1;
        cat.total_attempts = 1;
        cat.last_attempted_at = Some(now);
        let words = [Word::new("dog"), cat];
        assert_eq!(s.select_next(words.iter()).unwrap().text, "cat");
    }

    #[test]
    fn streak_lowers_priority() {
        let s = scheduler();
        let now = Utc::now();
        let mut cat = Word::new("cat");
        cat.consecutive_correct = 2;
        cat.correct_count = 2;
        cat.total_attempts = 2;
        cat.last_attempted_at = Some(now - Duration::hours(1));
        let mut dog = Word::new("dog");
        dog.consecutive_correct = 1;
        dog.correct_count = 1;
        dog.total_attempts = 1;
        dog.last_attempted_at = Some(now);
        // cat: -5 - 2 = -7, dog: 0 - 1 = -1
        assert_eq!(s.select_next([&cat, &dog]).unwrap().text, "dog");
    }

    #[test]
    fn recency_bonus_is_clamped() {
        let s = scheduler();
        let now = Utc::now();
        assert_eq!(s.recency_bonus(None, Some(now)), 1.0);
        assert_eq!(s.recency_bonus(Some(now), Some(now)), 0.0);
        assert_eq!(s.recency_bonus(Some(now - Duration::days(1)), Some(now)), 1.0);
        let half = s.recency_bonus(Some(now - Duration::seconds(150)), Some(now));
        assert!((half - 0.5).abs() < 1e-9);
    }
}
