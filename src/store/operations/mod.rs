pub mod artifact_cache;
pub mod dictionaries;
pub mod session_checkpoints;
pub mod user_progress;
