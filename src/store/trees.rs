pub const DICTIONARIES: &str = "dictionaries";
pub const SESSION_CHECKPOINTS: &str = "session_checkpoints";
pub const USER_PROGRESS: &str = "user_progress";
pub const ARTIFACT_CACHE: &str = "artifact_cache";
pub const META: &str = "meta";
