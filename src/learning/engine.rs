use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::constants::USER_SLOT_PRUNE_THRESHOLD;
use crate::content::{ContentProvider, WordPrompt};
use crate::learning::config::LearningConfig;
use crate::learning::error::SessionError;
use crate::learning::persistence::{
    CheckpointSummary, PersistenceError, ProgressStore, SessionPersistence,
};
use crate::learning::scheduler::PriorityScheduler;
use crate::learning::session::{AnswerFeedback, LearningSession, SessionEvent, SessionState};
use crate::learning::tracker::{DictionaryProgressSummary, ProgressTracker, TotalProgressSummary};
use crate::learning::types::{DifficultyMix, SessionProgress, SessionStats};
use crate::store::operations::dictionaries::Dictionary;
use crate::store::StoreError;

type Slot = Arc<Mutex<Option<LearningSession>>>;

/// 返回给调用方的会话快照
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub dict_id: String,
    pub dict_name: String,
    pub state: SessionState,
    pub prompt: Option<WordPrompt>,
    pub feedback: Option<AnswerFeedback>,
    pub progress: SessionProgress,
    pub stats: SessionStats,
    pub success_rate: f64,
    pub duration_secs: i64,
    pub show_progress_update: bool,
    pub mastered_words: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortReport {
    pub session_id: String,
    pub state: SessionState,
    pub stats: Option<SessionStats>,
}

/// 待出题的单词及其错误次数（决定干扰项难度）
struct PendingPrompt {
    word: String,
    incorrect_count: u32,
}

/// 会话编排：每个用户一个槽位，槽位锁保证同一学习者的事件串行处理。
/// 内容生成在锁外进行。
pub struct SessionEngine {
    config: LearningConfig,
    scheduler: PriorityScheduler,
    tracker: ProgressTracker,
    persistence: Arc<dyn SessionPersistence>,
    progress: Arc<dyn ProgressStore>,
    content: Arc<ContentProvider>,
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl SessionEngine {
    pub fn new(
        config: LearningConfig,
        persistence: Arc<dyn SessionPersistence>,
        progress: Arc<dyn ProgressStore>,
        content: Arc<ContentProvider>,
    ) -> Self {
        Self {
            scheduler: PriorityScheduler::new(config.weights.clone()),
            tracker: ProgressTracker::new(config.mastery_threshold),
            config,
            persistence,
            progress,
            content,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    async fn user_slot(&self, user_id: &str) -> Slot {
        let mut slots = self.slots.lock().await;

        // 只有表自身持有、且槽位为空的条目可以回收
        if slots.len() > USER_SLOT_PRUNE_THRESHOLD {
            slots.retain(|_, slot| {
                Arc::strong_count(slot) > 1
                    || slot.try_lock().map(|s| s.is_some()).unwrap_or(true)
            });
        }

        slots
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    pub async fn live_session_count(&self) -> usize {
        let slots = self.slots.lock().await;
        slots
            .values()
            .filter(|slot| slot.try_lock().map(|s| s.is_some()).unwrap_or(true))
            .count()
    }

    fn snapshot(
        &self,
        session: &LearningSession,
        feedback: Option<AnswerFeedback>,
    ) -> (SessionView, Option<PendingPrompt>) {
        let stats = session.stats();
        let pending = match session.state() {
            SessionState::Active => session.current_word().map(|w| PendingPrompt {
                word: w.text.clone(),
                incorrect_count: w.incorrect_count,
            }),
            _ => None,
        };
        let view = SessionView {
            session_id: session.session_id().to_string(),
            dict_id: session.dict_id().to_string(),
            dict_name: session.dict_name().to_string(),
            state: session.state(),
            prompt: None,
            feedback,
            progress: session.progress(),
            success_rate: stats.success_rate(),
            duration_secs: stats.duration_secs(Utc::now()),
            show_progress_update: session
                .should_show_progress_update(self.config.progress_update_interval),
            mastered_words: session
                .mastered_words()
                .into_iter()
                .map(str::to_string)
                .collect(),
            stats,
        };
        (view, pending)
    }

    /// 为待答单词组装题目。内容层的日志都落在带 user_id / session_id 的 span 里。
    async fn attach_prompt(
        &self,
        user_id: &str,
        view: &mut SessionView,
        pending: Option<PendingPrompt>,
        batch_tried: bool,
    ) -> Result<(), SessionError> {
        let Some(pending) = pending else {
            return Ok(());
        };
        let mix = DifficultyMix::for_incorrect_count(pending.incorrect_count);
        let span = content_span(user_id, &view.session_id);
        let result = if batch_tried {
            self.content
                .prompt_after_prefetch(&pending.word, mix)
                .instrument(span)
                .await
        } else {
            self.content.prompt_for(&pending.word, mix).instrument(span).await
        };
        match result {
            Ok(prompt) => {
                view.prompt = Some(prompt);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    user_id,
                    session_id = %view.session_id,
                    word = %pending.word,
                    error = %e,
                    "No answer options available"
                );
                Err(e.into())
            }
        }
    }

    /// 有界重试 + 线性退避
    async fn with_write_retries<T, E, F>(
        &self,
        op: &'static str,
        user_id: &str,
        session_id: &str,
        mut write: F,
    ) -> Result<T, SessionError>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        let policy = &self.config.persistence;
        let max_attempts = policy.max_write_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match write() {
                Ok(value) => return Ok(value),
                Err(e) => e.to_string(),
            };
            if attempt >= max_attempts {
                tracing::error!(op, user_id, session_id, attempt, error = %error, "Persistence write failed, giving up");
                return Err(SessionError::PersistenceWriteFailure { attempts: attempt });
            }
            tracing::warn!(op, user_id, session_id, attempt, error = %error, "Persistence write failed, retrying");
            tokio::time::sleep(Duration::from_millis(
                policy.retry_backoff_ms.saturating_mul(u64::from(attempt)),
            ))
            .await;
        }
    }

    pub async fn start(
        &self,
        user_id: &str,
        dictionary: &Dictionary,
    ) -> Result<SessionView, SessionError> {
        let slot = self.user_slot(user_id).await;
        let (mut view, pending) = {
            let mut guard = slot.lock().await;
            if let Some(live) = guard.as_ref() {
                return Err(SessionError::InvalidTransition {
                    from: Some(live.state()),
                    event: SessionEvent::Start,
                });
            }
            let mut session = LearningSession::new(
                user_id,
                &dictionary.id,
                &dictionary.name,
                &dictionary.words,
                Utc::now(),
            )?;
            session.start(&self.scheduler)?;
            tracing::info!(
                user_id,
                session_id = session.session_id(),
                dict_id = %dictionary.id,
                words = session.words_list().len(),
                "Session started"
            );
            let snapshot = self.snapshot(&session, None);
            *guard = Some(session);
            snapshot
        };

        // 新会话里所有单词都没有错误记录，按同一配比批量预取
        self.content
            .prefetch_variants(&dictionary.words, DifficultyMix::for_incorrect_count(0))
            .instrument(content_span(user_id, &view.session_id))
            .await;
        self.attach_prompt(user_id, &mut view, pending, true).await?;
        Ok(view)
    }

    pub async fn submit_answer(
        &self,
        user_id: &str,
        choice: &str,
    ) -> Result<SessionView, SessionError> {
        let slot = self.user_slot(user_id).await;
        let (mut view, pending) = {
            let mut guard = slot.lock().await;
            let Some(session) = guard.as_mut() else {
                return Err(SessionError::InvalidTransition {
                    from: None,
                    event: SessionEvent::SubmitAnswer,
                });
            };
            let feedback =
                session.submit_answer(choice, &self.scheduler, &self.tracker, Utc::now())?;
            tracing::debug!(
                user_id,
                session_id = session.session_id(),
                word = %feedback.word,
                correct = feedback.correct,
                newly_mastered = feedback.newly_mastered,
                "Answer recorded"
            );
            let snapshot = self.snapshot(session, Some(feedback));

            if session.state() == SessionState::Completed {
                // 终态会话离开槽位，无论后续写入是否成功
                if let Some(finished) = guard.take() {
                    if let Err(e) = self.finish_completed(user_id, &finished).await {
                        let (view, _) = snapshot;
                        return Err(match e {
                            SessionError::PersistenceWriteFailure { attempts } => {
                                SessionError::CompletionNotSaved {
                                    attempts,
                                    view: Box::new(view),
                                }
                            }
                            other => other,
                        });
                    }
                }
            }
            snapshot
        };

        self.attach_prompt(user_id, &mut view, pending, false).await?;
        Ok(view)
    }

    /// 先把会话合并进长期进度（按 session_id 去重），再删除检查点。
    /// 检查点删除失败时，残留的检查点不能再被恢复。
    async fn finish_completed(
        &self,
        user_id: &str,
        session: &LearningSession,
    ) -> Result<(), SessionError> {
        let session_id = session.session_id();
        let now = Utc::now();
        let tracker = &self.tracker;
        let progress = &self.progress;
        let applied = AtomicBool::new(false);
        let updated = self
            .with_write_retries("update_progress", user_id, session_id, || {
                progress.update_progress(user_id, &|p| {
                    applied.store(tracker.apply_completed_session(p, session, now), Ordering::SeqCst);
                })
            })
            .await?;
        if !applied.load(Ordering::SeqCst) {
            tracing::warn!(user_id, session_id, "Session already counted in progress, skipping");
        }

        let persistence = &self.persistence;
        self.with_write_retries("delete_checkpoint", user_id, session_id, || {
            persistence.delete(user_id, session_id)
        })
        .await?;

        let stats = session.stats();
        tracing::info!(
            user_id,
            session_id,
            words_mastered = stats.words_mastered,
            success_rate = stats.success_rate(),
            total_sessions = updated.total_sessions,
            "Session completed"
        );
        Ok(())
    }

    pub async fn pause(&self, user_id: &str) -> Result<SessionView, SessionError> {
        let slot = self.user_slot(user_id).await;
        let mut guard = slot.lock().await;
        let Some(session) = guard.as_mut() else {
            return Err(SessionError::InvalidTransition {
                from: None,
                event: SessionEvent::Pause,
            });
        };
        session.pause()?;

        let session_id = session.session_id().to_string();
        let persistence = &self.persistence;
        let saved = {
            let paused: &LearningSession = session;
            self.with_write_retries("save_checkpoint", user_id, &session_id, || {
                persistence.save(paused)
            })
            .await
        };
        if let Err(e) = saved {
            // 写入失败时会话保持活跃，学习者可以继续或稍后再试
            session.resume()?;
            return Err(e);
        }

        let (view, _) = self.snapshot(session, None);
        *guard = None;
        tracing::info!(user_id, session_id = %session_id, "Session paused");
        Ok(view)
    }

    pub async fn resume(&self, user_id: &str, session_id: &str) -> Result<SessionView, SessionError> {
        let slot = self.user_slot(user_id).await;
        let (mut view, pending) = {
            let mut guard = slot.lock().await;
            if let Some(live) = guard.as_ref() {
                return Err(SessionError::InvalidTransition {
                    from: Some(live.state()),
                    event: SessionEvent::Resume,
                });
            }
            let mut session = self.load_checkpoint(user_id, session_id)?;
            if self.already_completed(user_id, session_id)? {
                self.discard_stale_checkpoint(user_id, session_id);
                return Err(SessionError::SessionNotFound {
                    session_id: session_id.to_string(),
                });
            }
            session.resume()?;
            tracing::info!(user_id, session_id, "Session resumed");
            let snapshot = self.snapshot(&session, None);
            *guard = Some(session);
            snapshot
        };

        self.attach_prompt(user_id, &mut view, pending, false).await?;
        Ok(view)
    }

    fn already_completed(&self, user_id: &str, session_id: &str) -> Result<bool, SessionError> {
        Ok(self
            .progress
            .load_progress(user_id)?
            .is_some_and(|p| p.has_completed(session_id)))
    }

    /// 会话已计入进度但检查点删除失败时留下的记录
    fn discard_stale_checkpoint(&self, user_id: &str, session_id: &str) {
        tracing::warn!(user_id, session_id, "Checkpoint belongs to a completed session, discarding");
        if let Err(e) = self.persistence.delete(user_id, session_id) {
            tracing::error!(user_id, session_id, error = %e, "Failed to discard stale checkpoint");
        }
    }

    fn load_checkpoint(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<LearningSession, SessionError> {
        match self.persistence.load(user_id, session_id) {
            Ok(session) => Ok(session),
            Err(PersistenceError::NotFound { .. }) => Err(SessionError::SessionNotFound {
                session_id: session_id.to_string(),
            }),
            Err(PersistenceError::Corrupt { reason, .. }) => {
                tracing::error!(user_id, session_id, reason = %reason, "Corrupt session checkpoint");
                Err(SessionError::SessionCorrupt {
                    session_id: session_id.to_string(),
                    reason,
                })
            }
            // 无法组成存储键的 id 不可能对应任何检查点
            Err(PersistenceError::Store(StoreError::Validation(reason))) => {
                tracing::debug!(user_id, session_id, reason = %reason, "Malformed session id");
                Err(SessionError::SessionNotFound {
                    session_id: session_id.to_string(),
                })
            }
            Err(PersistenceError::Store(e)) => Err(e.into()),
        }
    }

    /// 放弃活跃或已暂停的会话，不计入长期进度
    pub async fn abort(&self, user_id: &str, session_id: &str) -> Result<AbortReport, SessionError> {
        let slot = self.user_slot(user_id).await;
        let mut guard = slot.lock().await;

        let live = if guard
            .as_ref()
            .is_some_and(|s| s.session_id() == session_id)
        {
            guard.take()
        } else {
            None
        };

        let stats = match live {
            Some(mut session) => {
                if let Err(e) = session.abort(Utc::now()) {
                    *guard = Some(session);
                    return Err(e);
                }
                Some(session.stats())
            }
            None => match self.load_checkpoint(user_id, session_id) {
                Ok(paused) => Some(paused.stats()),
                Err(SessionError::SessionCorrupt { .. }) => {
                    tracing::warn!(user_id, session_id, "Discarding corrupt checkpoint on abort");
                    None
                }
                Err(e) => return Err(e),
            },
        };

        let persistence = &self.persistence;
        self.with_write_retries("delete_checkpoint", user_id, session_id, || {
            persistence.delete(user_id, session_id)
        })
        .await?;

        tracing::info!(user_id, session_id, "Session aborted");
        Ok(AbortReport {
            session_id: session_id.to_string(),
            state: SessionState::Aborted,
            stats,
        })
    }

    /// 当前活跃会话的快照（含题目）。可用于内容生成失败后的重试。
    pub async fn current(&self, user_id: &str) -> Result<SessionView, SessionError> {
        let slot = self.user_slot(user_id).await;
        let (mut view, pending) = {
            let guard = slot.lock().await;
            let session = guard.as_ref().ok_or(SessionError::NoActiveSession)?;
            self.snapshot(session, None)
        };
        self.attach_prompt(user_id, &mut view, pending, false).await?;
        Ok(view)
    }

    pub async fn current_audio(&self, user_id: &str) -> Result<Option<Vec<u8>>, SessionError> {
        let slot = self.user_slot(user_id).await;
        let (session_id, word) = {
            let guard = slot.lock().await;
            let session = guard.as_ref().ok_or(SessionError::NoActiveSession)?;
            let word = session
                .current_word()
                .map(|w| w.text.clone())
                .ok_or(SessionError::NoActiveSession)?;
            (session.session_id().to_string(), word)
        };
        let audio = self
            .content
            .audio_for(&word)
            .instrument(content_span(user_id, &session_id))
            .await;
        if let Err(e) = &audio {
            tracing::warn!(user_id, session_id = %session_id, error = %e, "Audio unavailable");
        }
        Ok(audio?)
    }

    /// 已暂停的会话，不含已计入进度的残留检查点
    pub fn list_paused(&self, user_id: &str) -> Result<Vec<CheckpointSummary>, SessionError> {
        let paused = self.persistence.list(user_id).map_err(|e| match e {
            PersistenceError::Store(e) => SessionError::Store(e),
            PersistenceError::NotFound { session_id } => SessionError::SessionNotFound { session_id },
            PersistenceError::Corrupt { session_id, reason } => {
                SessionError::SessionCorrupt { session_id, reason }
            }
        })?;
        let Some(progress) = self.progress.load_progress(user_id)? else {
            return Ok(paused);
        };
        Ok(paused
            .into_iter()
            .filter(|c| !progress.has_completed(&c.session_id))
            .collect())
    }

    pub fn total_progress(&self, user_id: &str) -> Result<TotalProgressSummary, SessionError> {
        let progress = self.progress.load_progress(user_id)?.unwrap_or_else(|| {
            crate::store::operations::user_progress::UserProgress::new(user_id, Utc::now())
        });
        Ok(self.tracker.total_summary(&progress))
    }

    pub fn dictionary_progress(
        &self,
        user_id: &str,
        dictionary: &Dictionary,
    ) -> Result<(Option<DictionaryProgressSummary>, bool), SessionError> {
        let Some(progress) = self.progress.load_progress(user_id)? else {
            return Ok((None, false));
        };
        Ok((
            self.tracker.dictionary_summary(&progress, &dictionary.id),
            self.tracker.is_dictionary_learned(&progress, dictionary),
        ))
    }
}

fn content_span(user_id: &str, session_id: &str) -> tracing::Span {
    tracing::info_span!("content", user_id, session_id)
}
