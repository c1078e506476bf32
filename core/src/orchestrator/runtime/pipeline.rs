use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error};

use crate::orchestrator::error::MediatorError;
use crate::orchestrator::prompt::PromptContext;
use crate::orchestrator::traits::{OutboundSink, ReplyGenerator, SpeechSynthesizer};
use crate::orchestrator::types::OutboundMessage;
use crate::telemetry::events::{record_turn_cancelled, record_turn_delivered, record_turn_failed};

use super::state::{ConversationState, TurnTicket};

const TARGET: &str = "response_pipeline";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Checkpoint {
    AfterReply,
    AfterSynthesis,
}

impl Checkpoint {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Checkpoint::AfterReply => "after_reply",
            Checkpoint::AfterSynthesis => "after_synthesis",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TurnOutcome {
    Delivered { audio_bytes: usize },
    Cancelled(Checkpoint),
    Failed(MediatorError),
}

/// 生成回复 → 合成语音 → 下发音频，两个阶段之后各检查一次轮次是否已被打断。
pub(crate) struct ResponsePipeline {
    session_id: Arc<str>,
    prompt: Arc<PromptContext>,
    generator: Arc<dyn ReplyGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    outbound: Arc<dyn OutboundSink>,
    state: Arc<Mutex<ConversationState>>,
    delivery: Mutex<()>,
}

impl ResponsePipeline {
    pub(crate) fn new(
        session_id: Arc<str>,
        prompt: Arc<PromptContext>,
        generator: Arc<dyn ReplyGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        outbound: Arc<dyn OutboundSink>,
        state: Arc<Mutex<ConversationState>>,
    ) -> Self {
        Self {
            session_id,
            prompt,
            generator,
            synthesizer,
            outbound,
            state,
            delivery: Mutex::new(()),
        }
    }

    pub(crate) async fn run(&self, ticket: TurnTicket) -> TurnOutcome {
        let started = Instant::now();
        let request = {
            let guard = self.state.lock().await;
            self.prompt.request(guard.history.snapshot())
        };

        let reply = match self.generator.generate(&request).await {
            Ok(reply) => reply,
            Err(err) => return self.fail(ticket, MediatorError::reply(err)).await,
        };

        self.voice(ticket, &reply, started).await
    }

    /// 下行通道的写入顺序锁，须先于会话状态锁获取。
    pub(crate) async fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().await
    }

    /// 调用方须持有 [`Self::lock_delivery`] 返回的锁。
    pub(crate) async fn stop_playback(&self) {
        self.outbound.deliver(OutboundMessage::StopPlayback).await;
    }

    /// 开场白：直接合成固定文本，不经过语言模型。
    pub(crate) async fn speak(&self, ticket: TurnTicket, text: &str) -> TurnOutcome {
        self.voice(ticket, text, Instant::now()).await
    }

    async fn voice(&self, ticket: TurnTicket, text: &str, started: Instant) -> TurnOutcome {
        {
            let mut guard = self.state.lock().await;
            if !guard.controller.is_current(ticket) {
                return self.cancelled(ticket, Checkpoint::AfterReply);
            }
            guard.history.push_agent(text);
        }

        let audio = match self.synthesizer.synthesize(text).await {
            Ok(audio) => audio,
            Err(err) => return self.fail(ticket, MediatorError::synthesis(err)).await,
        };

        let audio_bytes = audio.len();
        {
            // 持有下发锁完成判定与下发，被打断轮次的音频一定排在停止信号之前；
            // 会话状态锁只在判定时持有，下行通道阻塞不会拖住关闭与查询。
            let _lane = self.lock_delivery().await;
            let current = self.state.lock().await.controller.is_current(ticket);
            if !current {
                return self.cancelled(ticket, Checkpoint::AfterSynthesis);
            }
            self.outbound.deliver(OutboundMessage::Audio(audio)).await;
        }

        record_turn_delivered(&self.session_id, ticket.id(), started.elapsed(), audio_bytes);
        TurnOutcome::Delivered { audio_bytes }
    }

    fn cancelled(&self, ticket: TurnTicket, checkpoint: Checkpoint) -> TurnOutcome {
        debug!(
            target: TARGET,
            session_id = %self.session_id,
            turn_id = ticket.id(),
            checkpoint = checkpoint.as_str(),
            "turn superseded, dropping result"
        );
        record_turn_cancelled(&self.session_id, ticket.id(), checkpoint.as_str());
        TurnOutcome::Cancelled(checkpoint)
    }

    async fn fail(&self, ticket: TurnTicket, err: MediatorError) -> TurnOutcome {
        let released = self.state.lock().await.controller.release(ticket);
        error!(
            target: TARGET,
            session_id = %self.session_id,
            turn_id = ticket.id(),
            kind = err.kind(),
            released,
            %err,
            "agent turn abandoned"
        );
        record_turn_failed(&self.session_id, ticket.id(), err.kind(), &err.to_string());
        TurnOutcome::Failed(err)
    }
}
