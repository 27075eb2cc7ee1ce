use thiserror::Error;

use crate::content::ContentError;
use crate::learning::engine::SessionView;
use crate::learning::session::{SessionEvent, SessionState};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("dictionary {dict_id} has no words")]
    EmptyDictionary { dict_id: String },
    #[error("event `{event}` is not valid in state {}", state_label(.from))]
    InvalidTransition {
        from: Option<SessionState>,
        event: SessionEvent,
    },
    #[error("no active session")]
    NoActiveSession,
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },
    #[error("session checkpoint {session_id} is corrupt: {reason}")]
    SessionCorrupt { session_id: String, reason: String },
    #[error("no answer options available for word `{word}`")]
    GenerationUnavailable { word: String },
    #[error("persistence write failed after {attempts} attempts")]
    PersistenceWriteFailure { attempts: u32 },
    /// 会话已完成并离开槽位，但进度或检查点清理没有写入成功
    #[error("session {} completed but was not saved after {attempts} attempts", .view.session_id)]
    CompletionNotSaved {
        attempts: u32,
        view: Box<SessionView>,
    },
    #[error("dictionary not found: {dict_id}")]
    DictionaryNotFound { dict_id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 没有活跃会话时显示为 idle
fn state_label(state: &Option<SessionState>) -> &'static str {
    state.map(SessionState::as_str).unwrap_or("idle")
}

impl From<ContentError> for SessionError {
    fn from(value: ContentError) -> Self {
        match value {
            ContentError::Unavailable { word, .. } => Self::GenerationUnavailable { word },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_message_names_state() {
        let err = SessionError::InvalidTransition {
            from: None,
            event: SessionEvent::Pause,
        };
        assert_eq!(err.to_string(), "event `pause` is not valid in state idle");

        let err = SessionError::InvalidTransition {
            from: Some(SessionState::Paused),
            event: SessionEvent::SubmitAnswer,
        };
        assert!(err.to_string().contains("paused"));
    }
}
