use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::orchestrator::types::TranscriptionEvent;
use crate::session::lifecycle::{emit_lifecycle, SessionLifecyclePhase, SessionLifecycleUpdate};
use crate::telemetry::events::{record_turn_interrupted, record_turn_started};

use super::pipeline::ResponsePipeline;
use super::state::ConversationState;

const TARGET: &str = "turn_controller";

/// 单个会话的事件循环：按识别顺序逐个处理事件，回复流水线在独立任务中运行。
pub(crate) struct SessionWorker {
    session_id: Arc<str>,
    events_rx: mpsc::Receiver<TranscriptionEvent>,
    state: Arc<Mutex<ConversationState>>,
    pipeline: Arc<ResponsePipeline>,
    greeting: Option<String>,
    lifecycle_tx: broadcast::Sender<SessionLifecycleUpdate>,
}

impl SessionWorker {
    pub(crate) fn new(
        session_id: Arc<str>,
        events_rx: mpsc::Receiver<TranscriptionEvent>,
        state: Arc<Mutex<ConversationState>>,
        pipeline: Arc<ResponsePipeline>,
        greeting: Option<String>,
        lifecycle_tx: broadcast::Sender<SessionLifecycleUpdate>,
    ) -> Self {
        Self {
            session_id,
            events_rx,
            state,
            pipeline,
            greeting,
            lifecycle_tx,
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(mut self) {
        self.greet().await;
        self.emit(SessionLifecyclePhase::Listening);

        while let Some(event) = self.events_rx.recv().await {
            self.handle_event(event).await;
        }

        if !self.state.lock().await.controller.is_closed() {
            warn!(
                target: TARGET,
                session_id = %self.session_id,
                "transcription ended, no further turns will start"
            );
            self.emit(SessionLifecyclePhase::TranscriptionLost);
        }
    }

    async fn greet(&self) {
        let Some(greeting) = self.greeting.as_deref() else {
            return;
        };

        let ticket = self.state.lock().await.controller.begin_turn();
        let Some(ticket) = ticket else {
            return;
        };

        self.emit(SessionLifecyclePhase::Greeting);
        record_turn_started(&self.session_id, ticket.id(), 0);
        let outcome = self.pipeline.speak(ticket, greeting).await;
        self.state.lock().await.controller.release(ticket);
        debug!(
            target: TARGET,
            session_id = %self.session_id,
            ?outcome,
            "greeting finished"
        );
    }

    async fn handle_event(&self, event: TranscriptionEvent) {
        // 锁顺序：先下发锁，再会话状态锁。
        let lane = self.pipeline.lock_delivery().await;
        let mut guard = self.state.lock().await;
        let decision = guard.controller.observe(&event);
        debug!(
            target: TARGET,
            session_id = %self.session_id,
            is_final = event.is_final,
            state = guard.controller.state().as_str(),
            "transcription event observed"
        );

        let utterance = event.text.trim();
        if decision.started.is_some() {
            guard.history.push_caller(utterance);
        }
        let history_len = guard.history.len();
        drop(guard);

        if let Some(cancelled) = decision.cancelled {
            self.pipeline.stop_playback().await;
            info!(
                target: TARGET,
                session_id = %self.session_id,
                turn_id = cancelled.id(),
                is_final = event.is_final,
                "caller barged in, agent turn cancelled"
            );
            record_turn_interrupted(&self.session_id, cancelled.id());
        }
        drop(lane);

        let Some(ticket) = decision.started else {
            return;
        };

        info!(
            target: TARGET,
            session_id = %self.session_id,
            turn_id = ticket.id(),
            history_len,
            "caller utterance finalized, starting agent turn"
        );
        record_turn_started(&self.session_id, ticket.id(), utterance.chars().count());

        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            pipeline.run(ticket).await;
        });
    }

    fn emit(&self, phase: SessionLifecyclePhase) {
        emit_lifecycle(
            &self.lifecycle_tx,
            SessionLifecycleUpdate::new(self.session_id.as_ref(), phase),
        );
    }
}
