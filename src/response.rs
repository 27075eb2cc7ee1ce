use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::learning::SessionError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub code: String,
    pub message: String,
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub is_operational: bool,
    /// 随错误一起返回的数据，例如未能保存的完成结果
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn bad_request(code: &str, message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: code.to_string(),
            message: message.to_string(),
            is_operational: true,
            details: None,
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND".to_string(),
            message: message.to_string(),
            is_operational: true,
            details: None,
        }
    }

    pub fn conflict(code: &str, message: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            code: code.to_string(),
            message: message.to_string(),
            is_operational: true,
            details: None,
        }
    }

    pub fn unprocessable(code: &str, message: &str) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            code: code.to_string(),
            message: message.to_string(),
            is_operational: true,
            details: None,
        }
    }

    pub fn service_unavailable(code: &str, message: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: code.to_string(),
            message: message.to_string(),
            is_operational: true,
            details: None,
        }
    }

    pub fn internal(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.to_string(),
            is_operational: false,
            details: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let exposed_message = if self.is_operational {
            self.message.clone()
        } else {
            "Internal server error".to_string()
        };

        if self.is_operational {
            tracing::warn!(status = %self.status, code = %self.code, error = %self.message, "API error");
        } else {
            tracing::error!(status = %self.status, code = %self.code, error = %self.message, "Internal API error");
        }

        (
            self.status,
            Json(ErrorBody {
                success: false,
                code: self.code,
                message: exposed_message,
                trace_id: None,
                details: self.details,
            }),
        )
            .into_response()
    }
}

// StoreError 映射：Validation -> 400，其余 -> 500（消息不对外暴露）
impl From<crate::store::StoreError> for AppError {
    fn from(value: crate::store::StoreError) -> Self {
        match &value {
            crate::store::StoreError::Validation(msg) => {
                AppError::bad_request("VALIDATION_ERROR", msg)
            }
            _ => AppError::internal(&value.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(value: SessionError) -> Self {
        let message = value.to_string();
        match value {
            SessionError::EmptyDictionary { .. } => {
                AppError::bad_request("EMPTY_DICTIONARY", &message)
            }
            SessionError::InvalidTransition { .. } => {
                AppError::conflict("INVALID_TRANSITION", &message)
            }
            SessionError::NoActiveSession => AppError {
                code: "NO_ACTIVE_SESSION".to_string(),
                ..AppError::not_found(&message)
            },
            SessionError::SessionNotFound { .. } => AppError {
                code: "SESSION_NOT_FOUND".to_string(),
                ..AppError::not_found(&message)
            },
            SessionError::DictionaryNotFound { .. } => AppError {
                code: "DICTIONARY_NOT_FOUND".to_string(),
                ..AppError::not_found(&message)
            },
            SessionError::SessionCorrupt { .. } => {
                AppError::unprocessable("SESSION_CORRUPT", &message)
            }
            SessionError::GenerationUnavailable { .. } => {
                AppError::service_unavailable("GENERATION_UNAVAILABLE", &message)
            }
            SessionError::PersistenceWriteFailure { .. } => AppError {
                code: "PERSISTENCE_WRITE_FAILED".to_string(),
                is_operational: true,
                ..AppError::internal(&message)
            },
            SessionError::CompletionNotSaved { view, .. } => AppError {
                code: "PERSISTENCE_WRITE_FAILED".to_string(),
                is_operational: true,
                details: serde_json::to_value(&*view).ok(),
                ..AppError::internal(&message)
            },
            SessionError::Store(e) => e.into(),
        }
    }
}

pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse {
            success: true,
            data,
        }),
    )
}

pub fn created<T: Serialize>(data: T) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(ApiResponse {
            success: true,
            data,
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::response::IntoResponse;

    use super::*;

    #[tokio::test]
    async fn internal_error_is_redacted() {
        let resp = AppError::internal("db crash").into_response();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("db crash"));
        assert!(text.contains("Internal server error"));
    }

    #[tokio::test]
    async fn bad_request_keeps_message() {
        let resp = AppError::bad_request("BAD_INPUT", "invalid email").into_response();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("invalid email"));
        assert!(text.contains("BAD_INPUT"));
    }

    #[tokio::test]
    async fn error_field_is_code() {
        let resp = AppError::bad_request("BAD_INPUT", "invalid email").into_response();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "BAD_INPUT");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn session_errors_map_to_statuses() {
        use crate::learning::session::{SessionEvent, SessionState};

        let conflict: AppError = SessionError::InvalidTransition {
            from: Some(SessionState::Active),
            event: SessionEvent::Start,
        }
        .into();
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let missing: AppError = SessionError::SessionNotFound {
            session_id: "s1".to_string(),
        }
        .into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        assert_eq!(missing.code, "SESSION_NOT_FOUND");

        let corrupt: AppError = SessionError::SessionCorrupt {
            session_id: "s1".to_string(),
            reason: "bad".to_string(),
        }
        .into();
        assert_eq!(corrupt.status, StatusCode::UNPROCESSABLE_ENTITY);

        let unavailable: AppError = SessionError::GenerationUnavailable {
            word: "cat".to_string(),
        }
        .into();
        assert_eq!(unavailable.status, StatusCode::SERVICE_UNAVAILABLE);

        let failed: AppError = SessionError::PersistenceWriteFailure { attempts: 4 }.into();
        assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.code, "PERSISTENCE_WRITE_FAILED");
        assert!(failed.is_operational);
    }

    #[tokio::test]
    async fn not_found_code_field() {
        let resp = AppError::not_found("Resource not found").into_response();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn details_are_serialized_only_when_present() {
        let plain = AppError::bad_request("BAD_INPUT", "nope").into_response();
        let body = to_bytes(plain.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("details").is_none());

        let err = AppError {
            code: "PERSISTENCE_WRITE_FAILED".to_string(),
            is_operational: true,
            details: Some(serde_json::json!({ "state": "completed" })),
            ..AppError::internal("session completed but was not saved")
        };
        let body = to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["details"]["state"], "completed");
        assert_eq!(json["message"], "session completed but was not saved");
    }
}
