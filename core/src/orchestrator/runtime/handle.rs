use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

use crate::audio::TranscriptStream;
use crate::orchestrator::types::{AgentState, DialogueEntry};
use crate::session::lifecycle::{emit_lifecycle, SessionLifecyclePhase, SessionLifecycleUpdate};

use super::state::ConversationState;

/// 一个来电连接对应的会话句柄；丢弃句柄即结束会话。
pub struct SessionHandle {
    session_id: Arc<str>,
    transcripts: TranscriptStream,
    state: Arc<Mutex<ConversationState>>,
    closed: Arc<AtomicBool>,
    lifecycle_tx: broadcast::Sender<SessionLifecycleUpdate>,
    worker: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub(super) fn new(
        session_id: Arc<str>,
        transcripts: TranscriptStream,
        state: Arc<Mutex<ConversationState>>,
        closed: Arc<AtomicBool>,
        lifecycle_tx: broadcast::Sender<SessionLifecycleUpdate>,
        worker: JoinHandle<()>,
    ) -> Self {
        Self {
            session_id,
            transcripts,
            state,
            closed,
            lifecycle_tx,
            worker: Some(worker),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Forwards one inbound audio frame verbatim to the recognition stream.
    pub async fn feed(&self, chunk: Bytes) {
        self.transcripts.feed(chunk).await;
    }

    pub async fn history(&self) -> Vec<DialogueEntry> {
        self.state.lock().await.history.snapshot()
    }

    pub async fn agent_state(&self) -> AgentState {
        self.state.lock().await.controller.state()
    }

    pub fn is_closed(&self) -> bool {
        self.worker.is_none()
    }

    /// 连接断开时调用，可重复调用。仍在等待协作方的回复任务会在检查点静默退出。
    pub async fn close(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.closed.store(true, Ordering::SeqCst);
        self.transcripts.close();
        worker.abort();
        self.state.lock().await.controller.close();

        info!(target: "session_manager", session_id = %self.session_id, "session closed");
        emit_lifecycle(
            &self.lifecycle_tx,
            SessionLifecycleUpdate::new(self.session_id.as_ref(), SessionLifecyclePhase::Closed),
        );
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.transcripts.close();
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}
