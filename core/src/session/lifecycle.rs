//! 会话生命周期广播负载定义。

use std::time::SystemTime;

use tokio::sync::broadcast;
use tracing::debug;

/// 会话的阶段划分。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLifecyclePhase {
    Connected,
    Greeting,
    Listening,
    TranscriptionLost,
    Closed,
}

impl SessionLifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionLifecyclePhase::Connected => "connected",
            SessionLifecyclePhase::Greeting => "greeting",
            SessionLifecyclePhase::Listening => "listening",
            SessionLifecyclePhase::TranscriptionLost => "transcription_lost",
            SessionLifecyclePhase::Closed => "closed",
        }
    }
}

/// 生命周期事件。
#[derive(Debug, Clone)]
pub struct SessionLifecycleUpdate {
    pub session_id: String,
    pub phase: SessionLifecyclePhase,
    pub issued_at: SystemTime,
}

impl SessionLifecycleUpdate {
    pub fn new<S: Into<String>>(session_id: S, phase: SessionLifecyclePhase) -> Self {
        Self {
            session_id: session_id.into(),
            phase,
            issued_at: SystemTime::now(),
        }
    }
}

/// 没有订阅者时广播失败属于正常情况，只记录调试日志。
pub(crate) fn emit_lifecycle(
    tx: &broadcast::Sender<SessionLifecycleUpdate>,
    update: SessionLifecycleUpdate,
) {
    let phase = update.phase.as_str();
    if let Err(err) = tx.send(update) {
        debug!(
            target: "session_manager",
            phase,
            %err,
            "no lifecycle subscribers"
        );
    }
}
