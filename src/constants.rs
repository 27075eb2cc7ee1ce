/// CAS（Compare-And-Swap）操作最大重试次数
pub const MAX_CAS_RETRIES: u32 = 20;

/// 默认掌握阈值：连续答对次数
pub const DEFAULT_MASTERY_THRESHOLD: u32 = 3;

/// 每个单词生成的错误拼写数量
pub const DEFAULT_VARIANTS_COUNT: usize = 3;

/// 每答多少题展示一次阶段性进度
pub const DEFAULT_PROGRESS_UPDATE_INTERVAL: u32 = 5;

/// 检查点持久化失败后的本地重试次数
pub const DEFAULT_PERSIST_MAX_RETRIES: u32 = 3;

/// 检查点持久化重试的基础退避（毫秒）
pub const DEFAULT_PERSIST_RETRY_BACKOFF_MS: u64 = 50;

/// 检查点记录格式版本
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// 用户槽位表超过此数量时清理空闲槽位
pub const USER_SLOT_PRUNE_THRESHOLD: usize = 1000;

/// 单个词典允许的最大单词数
pub const MAX_DICTIONARY_WORDS: usize = 500;

/// 单词最大长度（字符）
pub const MAX_WORD_CHARS: usize = 64;

/// 暂停检查点默认保留天数
pub const DEFAULT_CHECKPOINT_TTL_DAYS: i64 = 30;

/// UserProgress 中保留的已完成会话 id 数量
pub const COMPLETED_SESSION_HISTORY: usize = 200;
