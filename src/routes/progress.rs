use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::extractors::UserId;
use crate::learning::tracker::DictionaryProgressSummary;
use crate::response::{ok, AppError};
use crate::routes::dictionaries::load_dictionary;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(total_progress))
        .route("/:id", get(dictionary_progress))
}

async fn total_progress(
    user: UserId,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    Ok(ok(state.engine().total_progress(&user)?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DictionaryProgressResponse {
    dict_id: String,
    dict_name: String,
    total_words: usize,
    learned: bool,
    summary: Option<DictionaryProgressSummary>,
}

async fn dictionary_progress(
    user: UserId,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let dictionary = load_dictionary(&state, &user, &id)?;
    let (summary, learned) = state.engine().dictionary_progress(&user, &dictionary)?;
    Ok(ok(DictionaryProgressResponse {
        dict_id: dictionary.id,
        dict_name: dictionary.name,
        total_words: dictionary.words.len(),
        learned,
        summary,
    }))
}
