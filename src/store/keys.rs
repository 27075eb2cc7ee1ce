use crate::store::StoreError;

/// 键的组成部分不能为空，也不能包含分隔符 ':'
fn validate_component(field: &str, value: &str) -> Result<(), StoreError> {
    if value.is_empty() {
        return Err(StoreError::Validation(format!("{field} must not be empty")));
    }
    if value.contains(':') {
        return Err(StoreError::Validation(format!(
            "{field} must not contain ':'"
        )));
    }
    Ok(())
}

pub fn dictionary_key(user_id: &str, dict_id: &str) -> Result<String, StoreError> {
    validate_component("user_id", user_id)?;
    validate_component("dict_id", dict_id)?;
    Ok(format!("{}:{}", user_id, dict_id))
}

pub fn dictionary_prefix(user_id: &str) -> Result<String, StoreError> {
    validate_component("user_id", user_id)?;
    Ok(format!("{}:", user_id))
}

pub fn session_checkpoint_key(user_id: &str, session_id: &str) -> Result<String, StoreError> {
    validate_component("user_id", user_id)?;
    validate_component("session_id", session_id)?;
    Ok(format!("{}:{}", user_id, session_id))
}

pub fn session_checkpoint_prefix(user_id: &str) -> Result<String, StoreError> {
    validate_component("user_id", user_id)?;
    Ok(format!("{}:", user_id))
}

pub fn user_progress_key(user_id: &str) -> Result<String, StoreError> {
    validate_component("user_id", user_id)?;
    Ok(user_id.to_string())
}

pub fn artifact_key(digest_hex: &str) -> String {
    digest_hex.to_string()
}
