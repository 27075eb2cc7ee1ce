use std::collections::HashMap;

use futures::future::{self, BoxFuture};
use futures::FutureExt;

use crate::content::generator::{ContentGenerator, GenerationError};
use crate::learning::types::{capitalize, DifficultyMix};

const VOWEL_SWAPS: &[(char, char)] = &[
    ('о', 'а'),
    ('а', 'о'),
    ('е', 'и'),
    ('и', 'е'),
    ('я', 'е'),
    ('o', 'a'),
    ('a', 'e'),
    ('e', 'i'),
    ('i', 'e'),
    ('u', 'o'),
];

const CONSONANT_PAIRS: &[(char, char)] = &[
    ('д', 'т'),
    ('т', 'д'),
    ('б', 'п'),
    ('п', 'б'),
    ('г', 'к'),
    ('к', 'г'),
    ('в', 'ф'),
    ('ф', 'в'),
    ('ж', 'ш'),
    ('ш', 'ж'),
    ('з', 'с'),
    ('с', 'з'),
    ('d', 't'),
    ('t', 'd'),
    ('b', 'p'),
    ('p', 'b'),
    ('g', 'k'),
    ('k', 'g'),
    ('v', 'f'),
    ('f', 'v'),
    ('s', 'z'),
    ('z', 's'),
];

const DOUBLING: &str = "крлнмстбпвгджзшщklmnrstbpdgfvz";
const VOWELS: &str = "аеиоуюяёaeiou";
const INSERTED_VOWELS: &[char] = &['а', 'е', 'и', 'о', 'у'];
const INSERTED_VOWELS_LATIN: &[char] = &['a', 'e', 'i', 'o', 'u'];

/// 离线错误拼写生成器：按固定策略顺序替换字母，结果确定。
///
/// 策略依次为：元音替换、清浊辅音互换、辅音重复、丢元音、丢辅音、相邻换位、插入元音。
#[derive(Debug, Clone)]
pub struct MisspellingGenerator {
    count: usize,
}

impl MisspellingGenerator {
    pub fn new(count: usize) -> Self {
        Self {
            count: count.max(1),
        }
    }

    pub fn generate(&self, word: &str) -> Result<Vec<String>, GenerationError> {
        let chars: Vec<char> = word.trim().to_lowercase().chars().collect();
        if chars.is_empty() {
            return Err(GenerationError::InvalidResponse("empty word".to_string()));
        }
        let original: String = chars.iter().collect();
        let mut out = Variants::new(&original, self.count);

        for &(from, to) in VOWEL_SWAPS {
            if let Some(i) = chars.iter().position(|&c| c == from) {
                out.push(replace_at(&chars, i, to));
            }
        }
        for &(from, to) in CONSONANT_PAIRS {
            if let Some(i) = chars.iter().position(|&c| c == from) {
                out.push(replace_at(&chars, i, to));
            }
        }
        for letter in DOUBLING.chars() {
            if let Some(i) = chars.iter().position(|&c| c == letter) {
                if i > 0 && chars.get(i + 1).is_some_and(|&next| next != letter) {
                    let mut v = chars.clone();
                    v.insert(i, letter);
                    out.push(v.into_iter().collect());
                }
            }
        }
        for (i, c) in chars.iter().enumerate() {
            if VOWELS.contains(*c) && chars.len() > 1 {
                out.push(remove_at(&chars, i));
            }
        }
        for (i, c) in chars.iter().enumerate() {
            if !VOWELS.contains(*c) && c.is_alphabetic() && i + 1 < chars.len() {
                out.push(remove_at(&chars, i));
            }
        }
        for i in 0..chars.len().saturating_sub(1) {
            if chars[i] != chars[i + 1] {
                let mut v = chars.clone();
                v.swap(i, i + 1);
                out.push(v.into_iter().collect());
            }
        }
        let inserted = if chars.iter().any(|c| c.is_ascii_alphabetic()) {
            INSERTED_VOWELS_LATIN
        } else {
            INSERTED_VOWELS
        };
        for i in 0..=chars.len() {
            for &vowel in inserted {
                let mut v = chars.clone();
                v.insert(i, vowel);
                out.push(v.into_iter().collect());
            }
        }

        let variants = out.finish();
        if variants.len() < self.count {
            return Err(GenerationError::InvalidResponse(format!(
                "only {} variants for `{word}`",
                variants.len()
            )));
        }
        Ok(variants)
    }
}

struct Variants<'a> {
    original: &'a str,
    limit: usize,
    items: Vec<String>,
}

impl<'a> Variants<'a> {
    fn new(original: &'a str, limit: usize) -> Self {
        Self {
            original,
            limit,
            items: Vec::with_capacity(limit),
        }
    }

    fn push(&mut self, candidate: String) {
        if self.items.len() < self.limit
            && !candidate.is_empty()
            && candidate != self.original
            && !self.items.contains(&candidate)
        {
            self.items.push(candidate);
        }
    }

    fn finish(self) -> Vec<String> {
        self.items.iter().map(|v| capitalize(v)).collect()
    }
}

fn replace_at(chars: &[char], index: usize, with: char) -> String {
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| if i == index { with } else { c })
        .collect()
}

fn remove_at(chars: &[char], index: usize) -> String {
    chars
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, &c)| c)
        .collect()
}

impl ContentGenerator for MisspellingGenerator {
    fn generate_variants_batch<'a>(
        &'a self,
        words: &'a [String],
        _mix: DifficultyMix,
    ) -> BoxFuture<'a, Result<HashMap<String, Vec<String>>, GenerationError>> {
        let mut batch = HashMap::with_capacity(words.len());
        for word in words {
            match self.generate(word) {
                Ok(variants) => {
                    batch.insert(word.clone(), variants);
                }
                Err(e) => tracing::debug!(word = %word, error = %e, "Offline generation skipped word"),
            }
        }
        future::ready(Ok(batch)).boxed()
    }

    fn generate_variants_single<'a>(
        &'a self,
        word: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, GenerationError>> {
        future::ready(self.generate(word)).boxed()
    }

    fn synthesize_audio<'a>(
        &'a self,
        _word: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, GenerationError>> {
        future::ready(Err(GenerationError::Disabled)).boxed()
    }
}
