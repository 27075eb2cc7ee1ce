use chrono::{Duration, Utc};

use crate::store::Store;

/// 单次运行最多删除的检查点数量
const PURGE_BATCH_LIMIT: usize = 5_000;

pub async fn run(store: &Store, ttl_days: i64) -> usize {
    tracing::debug!("checkpoint_cleanup: start");
    let cutoff = Utc::now() - Duration::days(ttl_days.max(1));
    match store.purge_session_checkpoints_before(cutoff, PURGE_BATCH_LIMIT) {
        Ok(count) => {
            tracing::info!(purged = count, ttl_days, "checkpoint_cleanup: done");
            count
        }
        Err(e) => {
            tracing::error!(error = %e, "checkpoint_cleanup failed");
            0
        }
    }
}
