use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::extractors::{JsonBody, UserId};
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::store::operations::dictionaries::{parse_word_list, Dictionary};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_dictionary).get(list_dictionaries))
        .route("/:id", get(get_dictionary).delete(delete_dictionary))
}

/// `words` 与 `text` 二选一；`text` 按逗号、分号、换行拆分
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDictionaryRequest {
    name: Option<String>,
    words: Option<Vec<String>>,
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DictionaryListItem {
    id: String,
    name: String,
    word_count: usize,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Dictionary> for DictionaryListItem {
    fn from(d: &Dictionary) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            word_count: d.words.len(),
            created_at: d.created_at,
        }
    }
}

async fn create_dictionary(
    user: UserId,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateDictionaryRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let mut raw = req.words.unwrap_or_default();
    if let Some(text) = req.text.as_deref() {
        raw.extend(parse_word_list(text));
    }
    let dictionary = state
        .store()
        .create_dictionary(&user, req.name.as_deref(), &raw)?;
    tracing::info!(
        user_id = %user.0,
        dict_id = %dictionary.id,
        words = dictionary.words.len(),
        "Dictionary created"
    );
    Ok(created(dictionary))
}

async fn list_dictionaries(
    user: UserId,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let items: Vec<DictionaryListItem> = state
        .store()
        .list_dictionaries(&user)?
        .iter()
        .map(DictionaryListItem::from)
        .collect();
    Ok(ok(items))
}

pub(crate) fn load_dictionary(
    state: &AppState,
    user_id: &str,
    dict_id: &str,
) -> Result<Dictionary, AppError> {
    state.store().get_dictionary(user_id, dict_id)?.ok_or_else(|| AppError {
        code: "DICTIONARY_NOT_FOUND".to_string(),
        ..AppError::not_found("Dictionary not found")
    })
}

async fn get_dictionary(
    user: UserId,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    Ok(ok(load_dictionary(&state, &user, &id)?))
}

async fn delete_dictionary(
    user: UserId,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    if !state.store().delete_dictionary(&user, &id)? {
        return Err(AppError {
            code: "DICTIONARY_NOT_FOUND".to_string(),
            ..AppError::not_found("Dictionary not found")
        });
    }
    Ok(ok(serde_json::json!({ "deleted": true })))
}
