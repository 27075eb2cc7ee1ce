use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_DICTIONARY_WORDS, MAX_WORD_CHARS};
use crate::learning::types::capitalize;
use crate::store::keys;
use crate::store::{Store, StoreError};

/// 用户词典：有序、去重后的单词列表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dictionary {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub words: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// 拆分自由文本输入（逗号、分号、换行分隔）
pub fn parse_word_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c == ';' || c == '\n' || c == '\r')
        .map(str::to_string)
        .collect()
}

/// 去空白、首字母大写、按小写去重，保留首次出现的顺序
pub fn normalize_words<S: AsRef<str>>(raw: &[S]) -> Result<Vec<String>, StoreError> {
    let mut seen = HashSet::new();
    let mut words = Vec::new();
    for item in raw {
        let trimmed = item.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.chars().count() > MAX_WORD_CHARS {
            return Err(StoreError::Validation(format!(
                "word exceeds {MAX_WORD_CHARS} characters"
            )));
        }
        let word = capitalize(trimmed);
        if seen.insert(word.to_lowercase()) {
            words.push(word);
        }
    }
    if words.is_empty() {
        return Err(StoreError::Validation(
            "dictionary must contain at least one word".to_string(),
        ));
    }
    if words.len() > MAX_DICTIONARY_WORDS {
        return Err(StoreError::Validation(format!(
            "dictionary exceeds {MAX_DICTIONARY_WORDS} words"
        )));
    }
    Ok(words)
}

impl Store {
    pub fn create_dictionary<S: AsRef<str>>(
        &self,
        user_id: &str,
        name: Option<&str>,
        raw_words: &[S],
    ) -> Result<Dictionary, StoreError> {
        let words = normalize_words(raw_words)?;
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => n.to_string(),
            None => format!("Dictionary #{}", self.count_dictionaries(user_id)? + 1),
        };
        let dictionary = Dictionary {
            id: uuid::Uuid::new_v4().simple().to_string(),
            user_id: user_id.to_string(),
            name,
            words,
            created_at: Utc::now(),
        };
        let key = keys::dictionary_key(user_id, &dictionary.id)?;
        self.dictionaries
            .insert(key.as_bytes(), Self::serialize(&dictionary)?)?;
        Ok(dictionary)
    }

    pub fn get_dictionary(
        &self,
        user_id: &str,
        dict_id: &str,
    ) -> Result<Option<Dictionary>, StoreError> {
        let key = keys::dictionary_key(user_id, dict_id)?;
        match self.dictionaries.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn list_dictionaries(&self, user_id: &str) -> Result<Vec<Dictionary>, StoreError> {
        let prefix = keys::dictionary_prefix(user_id)?;
        let mut dictionaries = Vec::new();
        for item in self.dictionaries.scan_prefix(prefix.as_bytes()) {
            let (_, v) = item?;
            dictionaries.push(Self::deserialize::<Dictionary>(&v)?);
        }
        dictionaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(dictionaries)
    }

    pub fn count_dictionaries(&self, user_id: &str) -> Result<u64, StoreError> {
        let prefix = keys::dictionary_prefix(user_id)?;
        let mut count = 0u64;
        for item in self.dictionaries.scan_prefix(prefix.as_bytes()) {
            let _ = item?;
            count += 1;
        }
        Ok(count)
    }

    /// 返回是否真的删除了记录
    pub fn delete_dictionary(&self, user_id: &str, dict_id: &str) -> Result<bool, StoreError> {
        let key = keys::dictionary_key(user_id, dict_id)?;
        Ok(self.dictionaries.remove(key.as_bytes())?.is_some())
    }
}
