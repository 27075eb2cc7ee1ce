use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::extractors::{JsonBody, UserId};
use crate::response::{created, ok, AppError};
use crate::routes::dictionaries::load_dictionary;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_session))
        .route("/paused", get(list_paused))
        .route("/current", get(current_session))
        .route("/current/audio", get(current_audio))
        .route("/current/answer", post(submit_answer))
        .route("/current/pause", post(pause_session))
        .route("/:id/resume", post(resume_session))
        .route("/:id/abort", post(abort_session))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest {
    dict_id: String,
}

async fn start_session(
    user: UserId,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let dictionary = load_dictionary(&state, &user, &req.dict_id)?;
    let view = state.engine().start(&user, &dictionary).await?;
    Ok(created(view))
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
    choice: String,
}

async fn submit_answer(
    user: UserId,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.engine().submit_answer(&user, &req.choice).await?;
    Ok(ok(view))
}

async fn pause_session(
    user: UserId,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().pause(&user).await?))
}

async fn resume_session(
    user: UserId,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().resume(&user, &id).await?))
}

async fn abort_session(
    user: UserId,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().abort(&user, &id).await?))
}

async fn current_session(
    user: UserId,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().current(&user).await?))
}

async fn current_audio(
    user: UserId,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    match state.engine().current_audio(&user).await? {
        Some(bytes) => Ok(([(header::CONTENT_TYPE, "audio/mpeg")], bytes).into_response()),
        None => Err(AppError {
            code: "AUDIO_UNAVAILABLE".to_string(),
            ..AppError::not_found("No audio available for the current word")
        }),
    }
}

async fn list_paused(
    user: UserId,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().list_paused(&user)?))
}
